use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub use serde_with::{serde_as, DeserializeAs, SerializeAs};

/// Duration 的人性化格式
///
/// 支持格式: "3s", "100ms", "2m", "1h", "1h30m45s", "2d"
pub struct HumanDur;

impl SerializeAs<Duration> for HumanDur {
    fn serialize_as<S>(source: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*source))
    }
}

impl<'de> DeserializeAs<'de, Duration> for HumanDur {
    fn deserialize_as<D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

const NANOS_PER_UNIT: [(&str, u128); 7] = [
    ("d", 86_400_000_000_000),
    ("h", 3_600_000_000_000),
    ("m", 60_000_000_000),
    ("s", 1_000_000_000),
    ("ms", 1_000_000),
    ("us", 1_000),
    ("ns", 1),
];

/// 解析时间字符串: "1h30m45s" -> Duration
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(anyhow!("空字符串"));
    }
    let max_nanos = Duration::MAX.as_nanos();
    let mut total: u128 = 0;
    let mut i = 0;
    let chars: Vec<char> = s.chars().collect();

    while i < chars.len() {
        let mut num_str = String::new();
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
            num_str.push(chars[i]);
            i += 1;
        }

        if num_str.is_empty() {
            return Err(anyhow!("期望数字: {}", s));
        }

        let mut unit_str = String::new();
        while i < chars.len() && (chars[i].is_ascii_alphabetic() || chars[i] == 'μ') {
            unit_str.push(chars[i]);
            i += 1;
        }

        if unit_str.is_empty() {
            return Err(anyhow!("缺少时间单位: {}", s));
        }

        let unit = if unit_str == "μs" { "us" } else { unit_str.as_str() };
        let nanos_per_unit = NANOS_PER_UNIT
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, nanos)| *nanos)
            .ok_or_else(|| anyhow!("不支持的时间单位: {}", unit_str))?;

        // 整数走精确的整数运算，小数才经过 f64
        let nanos = if num_str.contains('.') {
            let value: f64 = num_str
                .parse()
                .map_err(|_| anyhow!("无效数字: {}", num_str))?;
            let nanos = (value * nanos_per_unit as f64).round();
            if !nanos.is_finite() || nanos > max_nanos as f64 {
                return Err(anyhow!("时间过大: {}", s));
            }
            nanos as u128
        } else {
            let value: u128 = num_str
                .parse()
                .map_err(|_| anyhow!("时间过大: {}", s))?;
            value
                .checked_mul(nanos_per_unit)
                .ok_or_else(|| anyhow!("时间过大: {}", s))?
        };

        total = total
            .checked_add(nanos)
            .filter(|total| *total <= max_nanos)
            .ok_or_else(|| anyhow!("时间过大: {}", s))?;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| anyhow!("时间过大: {}", s))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

/// Duration 格式化为字符串: Duration -> "1h30m45s"
///
/// 按单位从大到小逐段输出，格式化结果可以被 `parse_duration` 无损解析
pub fn format_duration(duration: Duration) -> String {
    let mut remaining = duration.as_nanos();
    if remaining == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, nanos) in NANOS_PER_UNIT {
        let count = remaining / nanos;
        if count > 0 {
            out.push_str(&format!("{}{}", count, unit));
            remaining %= nanos;
        }
    }
    out
}
