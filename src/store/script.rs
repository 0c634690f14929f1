//! The sliding-window evaluator as a Redis Lua script.
//!
//! KEYS[1] is the sorted set. ARGV is period seconds, limit, expire seconds,
//! spacing microseconds and the reserve flag (1 or 0). Scores and members are
//! server timestamps in microseconds.

/// Error code the script replies with when a reservation is too close to the
/// newest event.
pub const TOO_FAST_CODE: &str = "TOOFAST";

/// Lua source of the evaluator.
pub const WINDOW_SCRIPT: &str = r#"
redis.replicate_commands()

local period     = tonumber(ARGV[1])
local limit      = tonumber(ARGV[2])
local expiretime = tonumber(ARGV[3])
local mindiff    = tonumber(ARGV[4])
local reserve    = tonumber(ARGV[5])

local now = redis.call("TIME")
local ts_string = now[1] .. string.format("%06d", tonumber(now[2]))
local ts = tonumber(ts_string)

local startwindow = ts - period * 1000000
redis.call("ZREMRANGEBYSCORE", KEYS[1], "-inf", startwindow)

local usage = tonumber(redis.call("ZCOUNT", KEYS[1], 1, ts))
if usage >= limit then
   return -usage
end

if reserve == 1 then
   local n = tonumber(redis.call("ZCOUNT", KEYS[1], ts - mindiff, ts))
   if n ~= 0 then
      return redis.error_reply("TOOFAST too fast requests")
   end
   redis.call("ZADD", KEYS[1], ts_string, ts_string)
   redis.call("EXPIRE", KEYS[1], expiretime)
   usage = tonumber(redis.call("ZCOUNT", KEYS[1], 0, ts))
   if usage > limit then
      return -usage
   end
end

return usage
"#;

/// Build the evaluator as an invocable script.
pub fn window_script() -> redis::Script {
    redis::Script::new(WINDOW_SCRIPT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_hash_is_stable() {
        let a = window_script();
        let b = window_script();
        assert_eq!(a.get_hash(), b.get_hash());
        assert_eq!(a.get_hash().len(), 40);
    }

    #[test]
    fn test_script_uses_error_code() {
        assert!(WINDOW_SCRIPT.contains(&format!("\"{} ", TOO_FAST_CODE)));
    }
}
