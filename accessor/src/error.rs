use crate::{Mode, Transfer};
use thiserror::Error;

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    /// 映射表中没有 `(mode, name)` 的规则。
    #[error("no mapper declared for ({mode}, {name})")]
    Unmapped { mode: Mode, name: &'static str },

    #[error("out of device memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    #[error("device memory is not aligned to {align} bytes for {name}")]
    Misaligned { name: &'static str, align: usize },

    /// 目标分配的存储块小于请求的大小。
    #[error("device allocation too small: requested {requested} bytes, allocated {allocated} bytes")]
    ShortAllocation { requested: usize, allocated: usize },

    /// 只读数据的规则要求拷回宿主。
    #[error("mapper ({mode}, {name}) declares map({transfer}) but the host data is borrowed read-only")]
    CopyOutOfRead {
        mode: Mode,
        name: &'static str,
        transfer: Transfer,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
