use crate::{
    AccessMode, Accessor, Blob, Element, Error, Mapper, MapperTable, Mode, Mutable, Read, Result,
    Target, Transfer,
};
use std::{
    any::TypeId,
    marker::PhantomData,
    mem::{align_of, take},
    ptr::NonNull,
    sync::atomic::{AtomicU64, Ordering::Relaxed},
};
use tracing::{debug, warn};

static NEXT_REGION: AtomicU64 = AtomicU64::new(0);

/// 卸载区域。
///
/// 访问器映射进区域时，按映射表中的规则分配设备存储并拷入数据；
/// 区域退出时拷回需要拷回的数据并释放设备存储。
/// 区域存续期间借用所有映射进来的访问器。
pub struct Region<'r, T: Target + ?Sized> {
    id: u64,
    target: &'r T,
    mappers: &'r MapperTable,
    slots: Vec<Slot<T::Blob>>,
    _host: PhantomData<&'r mut [u8]>,
}

struct Slot<B> {
    host: NonNull<[u8]>,
    mode: Mode,
    ty: TypeId,
    transfer: Transfer,
    blob: Option<B>,
}

impl<'r, T: Target + ?Sized> Region<'r, T> {
    pub fn new(target: &'r T, mappers: &'r MapperTable) -> Self {
        let id = NEXT_REGION.fetch_add(1, Relaxed);
        debug!(region = id, device = target.device(), "enter");
        Self {
            id,
            target,
            mappers,
            slots: Vec::new(),
            _host: PhantomData,
        }
    }

    pub const fn id(&self) -> u64 {
        self.id
    }

    /// 将访问器映射进区域，返回在设备上访问数据的句柄。
    pub fn map<M: Mappable<'r>>(&mut self, acc: M) -> Result<M::Output> {
        acc.map_into(self)
    }

    /// 在目标上执行 `kernel`。
    pub fn launch<R>(&mut self, name: &str, kernel: impl FnOnce(&Device) -> R) -> R {
        self.target.launch(name);
        debug!(region = self.id, kernel = name, "launch");

        let device = Device {
            region: self.id,
            slots: self
                .slots
                .iter()
                .map(|slot| slot.blob.as_ref().map(Blob::as_ptr))
                .collect(),
            _phantom: PhantomData,
        };
        kernel(&device)
    }

    /// 退出区域，拷回数据并释放设备存储。
    pub fn exit(mut self) {
        for slot in take(&mut self.slots) {
            let Slot {
                mut host,
                transfer,
                blob,
                ..
            } = slot;
            let Some(blob) = blob else { continue };

            if transfer.copies_out() {
                // 只有可变模式的规则会拷回，宿主数据区来自独占借用
                self.target.copy_out(&blob, unsafe { host.as_mut() })
            }
            self.target.free(blob)
        }
        debug!(region = self.id, "exit")
    }

    /// `host` 是访问器数据区的字节视图，`len` 是元素数量。
    fn bind<A: AccessMode, E: Element>(
        &mut self,
        host: NonNull<[u8]>,
        len: usize,
    ) -> Result<Mapped<A, E>> {
        let transfer = self.mappers.lookup::<A, E>()?;
        if !A::MODE.is_mutable() && transfer.copies_out() {
            return Err(Error::CopyOutOfRead {
                mode: A::MODE,
                name: E::NAME,
                transfer,
            });
        }

        let ty = TypeId::of::<E>();
        let n_bytes = host.len();
        if A::MODE == Mode::Read {
            let present = self
                .slots
                .iter()
                .position(|slot| slot.mode == Mode::Read && slot.ty == ty && slot.host == host);
            if let Some(slot) = present {
                debug!(region = self.id, slot, ty = E::NAME, "present");
                return Ok(Mapped::new(self.id, slot, len));
            }
        }

        let mut blob = self.target.malloc(n_bytes)?;
        let allocated = blob.as_ref().map_or(0, Blob::n_bytes);
        if allocated < n_bytes {
            if let Some(b) = blob {
                self.target.free(b)
            }
            return Err(Error::ShortAllocation {
                requested: n_bytes,
                allocated,
            });
        }
        let align = align_of::<E>();
        if let Some(b) = blob.take_if(|b| b.as_ptr().as_ptr().align_offset(align) != 0) {
            self.target.free(b);
            return Err(Error::Misaligned {
                name: E::NAME,
                align,
            });
        }
        if let Some(b) = blob.as_mut().filter(|_| transfer.copies_in()) {
            self.target.copy_in(b, unsafe { host.as_ref() })
        }

        let slot = self.slots.len();
        debug!(
            region = self.id,
            slot,
            mode = %A::MODE,
            ty = E::NAME,
            n_bytes,
            map = %transfer,
            "map"
        );
        self.slots.push(Slot {
            host,
            mode: A::MODE,
            ty,
            transfer,
            blob,
        });
        Ok(Mapped::new(self.id, slot, len))
    }
}

impl<T: Target + ?Sized> Drop for Region<'_, T> {
    fn drop(&mut self) {
        if !self.slots.is_empty() {
            warn!(
                region = self.id,
                slots = self.slots.len(),
                "region dropped without exit, device data discarded"
            )
        }
        for slot in self.slots.drain(..) {
            if let Some(blob) = slot.blob {
                self.target.free(blob)
            }
        }
    }
}

/// 能够映射进区域的访问器借用。
///
/// [`Read`] 访问器以共享借用映射，其他模式以独占借用映射。
pub trait Mappable<'r>: Sized {
    type Output;

    fn map_into<G: Target + ?Sized>(self, region: &mut Region<'r, G>) -> Result<Self::Output>;
}

impl<'r, T: Mapper<Read>> Mappable<'r> for &'r Accessor<'_, Read, T> {
    type Output = Mapped<Read, T>;

    fn map_into<G: Target + ?Sized>(self, region: &mut Region<'r, G>) -> Result<Self::Output> {
        let host = bytemuck::cast_slice::<T, u8>(self.as_slice());
        region.bind::<Read, T>(NonNull::from(host), self.size())
    }
}

impl<'r, A: Mutable, T: Mapper<A>> Mappable<'r> for &'r mut Accessor<'_, A, T> {
    type Output = Mapped<A, T>;

    fn map_into<G: Target + ?Sized>(self, region: &mut Region<'r, G>) -> Result<Self::Output> {
        let len = self.size();
        let host = bytemuck::cast_slice_mut::<T, u8>(self.as_mut_slice());
        region.bind::<A, T>(NonNull::from(host), len)
    }
}

/// 区域中执行计算时看到的设备存储。
pub struct Device<'d> {
    region: u64,
    slots: Vec<Option<NonNull<u8>>>,
    _phantom: PhantomData<&'d mut [u8]>,
}

impl Device<'_> {
    fn base<A: AccessMode, T>(&self, mapped: &Mapped<A, T>) -> NonNull<T> {
        assert_eq!(
            mapped.region, self.region,
            "mapped handle belongs to another region"
        );
        self.slots[mapped.slot].map_or(NonNull::dangling(), NonNull::cast)
    }
}

/// 映射进区域的数据句柄。
pub struct Mapped<A: AccessMode, T> {
    region: u64,
    slot: usize,
    len: usize,
    _phantom: PhantomData<(A, fn() -> T)>,
}

impl<A: AccessMode, T> Mapped<A, T> {
    const fn new(region: u64, slot: usize, len: usize) -> Self {
        Self {
            region,
            slot,
            len,
            _phantom: PhantomData,
        }
    }

    pub const fn size(&self) -> usize {
        self.len
    }
}

impl<T: Mapper<Read>> Mapped<Read, T> {
    /// 设备上的只读访问器。
    pub fn view<'d>(&self, device: &'d Device) -> Accessor<'d, Read, T> {
        unsafe { Accessor::from_raw_parts(device.base(self), self.len) }
    }
}

impl<A: Mutable, T: Mapper<A>> Mapped<A, T> {
    /// 设备上的可变访问器。
    pub fn view_mut<'d>(&'d mut self, device: &'d Device) -> Accessor<'d, A, T> {
        unsafe { Accessor::from_raw_parts(device.base(self), self.len) }
    }
}
