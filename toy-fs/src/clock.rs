/// 时间来源。核心是 `no_std` 的，时间戳由宿主提供。
pub trait Clock: Send + Sync {
    /// 自 Unix 纪元以来的秒数
    fn now(&self) -> u32;
}

/// 所有时间戳都为 0
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroClock;

impl Clock for ZeroClock {
    #[inline]
    fn now(&self) -> u32 {
        0
    }
}
