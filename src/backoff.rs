use rand::Rng;
use std::time::Duration;

/// 断线后的重连等待策略。
///
/// `Fixed` 是默认行为：每次断开后固定等待同样的时长，只排一次重连。
/// `Exponential` 按连续失败次数翻倍，封顶 `max`，再叠加 `[0, jitter]` 的随机抖动。
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    Fixed {
        delay: Duration,
    },
    Exponential {
        initial: Duration,
        max: Duration,
        jitter: Duration,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed {
            delay: Duration::from_millis(2000),
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed { delay }
    }

    /// 从配置项构建策略，`policy` 取 `fixed` 或 `exponential`
    pub fn from_parts(
        policy: &str,
        delay_ms: u64,
        max_delay_ms: u64,
        jitter_ms: u64,
    ) -> Result<Self, &'static str> {
        match policy.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed {
                delay: Duration::from_millis(delay_ms),
            }),
            "exponential" => {
                if max_delay_ms < delay_ms {
                    return Err("max_delay_ms must not be smaller than delay_ms");
                }
                Ok(Self::Exponential {
                    initial: Duration::from_millis(delay_ms),
                    max: Duration::from_millis(max_delay_ms),
                    jitter: Duration::from_millis(jitter_ms),
                })
            }
            _ => Err("reconnect policy must be `fixed` or `exponential`"),
        }
    }

    /// 第 `attempt` 次连续重连（从 1 开始）之前需要等待的时长
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => *delay,
            Self::Exponential {
                initial,
                max,
                jitter,
            } => {
                let shift = attempt.saturating_sub(1).min(16);
                let base = initial.saturating_mul(1u32 << shift).min(*max);
                if jitter.is_zero() {
                    return base;
                }
                let extra = rand::thread_rng().gen_range(0..=jitter.as_millis() as u64);
                base + Duration::from_millis(extra)
            }
        }
    }
}
