use crate::Transfer;
use std::{fmt, ptr::NonNull};

pub(crate) mod sealed {
    use std::ptr::NonNull;

    pub trait Sealed {}

    /// 能够构造访问器的宿主数据区。
    pub trait HostSlice<'a, T> {
        fn into_raw(self) -> (NonNull<T>, usize);
    }

    impl<'a, T> HostSlice<'a, T> for &'a [T] {
        fn into_raw(self) -> (NonNull<T>, usize) {
            (NonNull::from(self).cast(), self.len())
        }
    }

    impl<'a, T> HostSlice<'a, T> for &'a mut [T] {
        fn into_raw(self) -> (NonNull<T>, usize) {
            let len = self.len();
            (NonNull::from(self).cast(), len)
        }
    }
}

/// 访问模式。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Mode {
    /// 只读，进入区域前拷入设备。
    Read,
    /// 只写，离开区域时拷回宿主。
    Write,
    /// 读写，进入时拷入，离开时拷回。
    ReadWrite,
    /// 仅在设备上分配，不搬运数据。
    Temporary,
}

impl Mode {
    /// 访问模式对应的默认传输行为。
    pub const fn transfer(self) -> Transfer {
        match self {
            Self::Read => Transfer::To,
            Self::Write => Transfer::From,
            Self::ReadWrite => Transfer::ToFrom,
            Self::Temporary => Transfer::Alloc,
        }
    }

    pub const fn is_mutable(self) -> bool {
        !matches!(self, Self::Read)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "read-write",
            Self::Temporary => "temporary",
        })
    }
}

/// 编译期访问模式标记。
pub trait AccessMode: sealed::Sealed + 'static {
    const MODE: Mode;

    /// 构造此模式的访问器需要的宿主数据借用。
    type Slice<'a, T: 'a>: sealed::HostSlice<'a, T>;

    /// 访问器暴露的裸指针，[`Read`] 为 `*const T`，其他模式为 `*mut T`。
    type Ptr<T>: Copy;

    #[doc(hidden)]
    fn ptr<T>(ptr: NonNull<T>) -> Self::Ptr<T>;
}

/// 允许通过访问器修改数据的模式。
pub trait Mutable: AccessMode {}

pub enum Read {}
pub enum Write {}
pub enum ReadWrite {}
pub enum Temporary {}

impl sealed::Sealed for Read {}
impl sealed::Sealed for Write {}
impl sealed::Sealed for ReadWrite {}
impl sealed::Sealed for Temporary {}

impl AccessMode for Read {
    const MODE: Mode = Mode::Read;
    type Slice<'a, T: 'a> = &'a [T];
    type Ptr<T> = *const T;

    fn ptr<T>(ptr: NonNull<T>) -> *const T {
        ptr.as_ptr()
    }
}

impl AccessMode for Write {
    const MODE: Mode = Mode::Write;
    type Slice<'a, T: 'a> = &'a mut [T];
    type Ptr<T> = *mut T;

    fn ptr<T>(ptr: NonNull<T>) -> *mut T {
        ptr.as_ptr()
    }
}

impl AccessMode for ReadWrite {
    const MODE: Mode = Mode::ReadWrite;
    type Slice<'a, T: 'a> = &'a mut [T];
    type Ptr<T> = *mut T;

    fn ptr<T>(ptr: NonNull<T>) -> *mut T {
        ptr.as_ptr()
    }
}

impl AccessMode for Temporary {
    const MODE: Mode = Mode::Temporary;
    type Slice<'a, T: 'a> = &'a mut [T];
    type Ptr<T> = *mut T;

    fn ptr<T>(ptr: NonNull<T>) -> *mut T {
        ptr.as_ptr()
    }
}

impl Mutable for Write {}
impl Mutable for ReadWrite {}
impl Mutable for Temporary {}
