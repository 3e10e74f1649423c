mod accessor;
mod element;
mod error;
mod mapper;
mod mode;
mod region;

use std::ptr::NonNull;

pub use accessor::Accessor;
pub use element::Element;
pub use error::{Error, Result};
pub use mapper::{Mapper, MapperTable, Rule, Transfer};
pub use mode::{AccessMode, Mode, Mutable, Read, ReadWrite, Temporary, Write};
pub use region::{Device, Mappable, Mapped, Region};

pub extern crate digit_layout;

#[allow(non_camel_case_types)]
pub type device_id = u64;

/// 卸载目标。
///
/// 区域通过这组接口申请设备存储并在宿主与设备之间搬运数据，
/// 具体搬运哪些数据由 [`MapperTable`] 中的映射规则决定。
pub trait Target {
    /// 设备存储块。
    type Blob: Blob;

    /// 目标设备号。
    fn device(&self) -> device_id;

    /// 分配 `n_bytes` 字节的设备存储空间，`n_bytes` 为 0 时不分配，返回 `None`。
    ///
    /// 区域会拒绝小于 `n_bytes` 或基址不满足元素对齐的存储块。
    fn malloc(&self, n_bytes: usize) -> Result<Option<Self::Blob>>;

    /// 将宿主数据 `src` 拷贝到设备存储 `dst`。
    fn copy_in(&self, dst: &mut Self::Blob, src: &[u8]);

    /// 将设备存储 `src` 拷贝回宿主 `dst`。
    fn copy_out(&self, src: &Self::Blob, dst: &mut [u8]);

    /// 释放 `blob`。
    fn free(&self, blob: Self::Blob);

    /// 在目标上启动名为 `name` 的计算。
    fn launch(&self, name: &str) {
        let _ = name;
    }
}

/// 设备存储块。
///
/// # Safety
///
/// [`Blob::as_ptr`] 返回的地址在 [`Blob::n_bytes`] 字节范围内必须可读写且已初始化，
/// 并在存储块释放前保持不变。基址对齐不作要求，由区域按元素类型检查。
pub unsafe trait Blob {
    fn n_bytes(&self) -> usize;
    fn as_ptr(&self) -> NonNull<u8>;
}
