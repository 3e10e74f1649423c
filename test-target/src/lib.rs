use accessor::{Error, Result, Target, device_id};
use std::{cell::RefCell, collections::HashMap, fmt, ptr::NonNull};
use tracing::debug;


/// 用宿主内存模拟的卸载目标，记录所有存储操作。
pub struct TestTarget {
    device: device_id,
    capacity: Option<usize>,
    internal: RefCell<Internal>,
}

#[derive(Default)]
struct Internal {
    next_blob_id: usize,
    used: usize,
    live: HashMap<usize, usize>,
    records: Vec<Record>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Record {
    Alloc { id: usize, n_bytes: usize },
    CopyIn { id: usize, n_bytes: usize },
    CopyOut { id: usize, n_bytes: usize },
    Free { id: usize },
    Launch(String),
}

pub struct Blob {
    id: usize,
    n_bytes: usize,
    mem: NonNull<[u64]>,
}

impl Blob {
    fn new(id: usize, n_bytes: usize) -> Self {
        let words = n_bytes.div_ceil(size_of::<u64>());
        let mem = Box::leak(vec![0u64; words].into_boxed_slice());
        Self {
            id,
            n_bytes,
            mem: NonNull::from(mem),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        let words = unsafe { self.mem.as_ref() };
        &bytemuck::cast_slice::<u64, u8>(words)[..self.n_bytes]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let words = unsafe { self.mem.as_mut() };
        &mut bytemuck::cast_slice_mut::<u64, u8>(words)[..self.n_bytes]
    }
}

impl Drop for Blob {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.mem.as_ptr()) })
    }
}

unsafe impl accessor::Blob for Blob {
    fn n_bytes(&self) -> usize {
        self.n_bytes
    }

    fn as_ptr(&self) -> NonNull<u8> {
        self.mem.cast()
    }
}

impl Default for TestTarget {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TestTarget {
    pub fn new(device: device_id) -> Self {
        Self {
            device,
            capacity: None,
            internal: Default::default(),
        }
    }

    /// 限制设备存储总量为 `capacity` 字节。
    pub fn with_capacity(self, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..self
        }
    }

    pub fn records(&self) -> Vec<Record> {
        self.internal.borrow().records.clone()
    }

    /// 未释放的存储块数量。
    pub fn n_live(&self) -> usize {
        self.internal.borrow().live.len()
    }

    /// 已占用的设备存储字节数。
    pub fn used(&self) -> usize {
        self.internal.borrow().used
    }

    fn record(&self, record: Record) {
        debug!(device = self.device, "{record}");
        self.internal.borrow_mut().records.push(record)
    }
}

impl Target for TestTarget {
    type Blob = Blob;

    fn device(&self) -> device_id {
        self.device
    }

    fn malloc(&self, n_bytes: usize) -> Result<Option<Blob>> {
        if n_bytes == 0 {
            return Ok(None);
        }

        let id = {
            let mut internal = self.internal.borrow_mut();
            if let Some(capacity) = self.capacity {
                let available = capacity.saturating_sub(internal.used);
                if n_bytes > available {
                    return Err(Error::OutOfMemory {
                        requested: n_bytes,
                        available,
                    });
                }
            }

            let id = internal.next_blob_id;
            internal.next_blob_id += 1;
            internal.used += n_bytes;
            assert!(internal.live.insert(id, n_bytes).is_none());
            id
        };

        self.record(Record::Alloc { id, n_bytes });
        Ok(Some(Blob::new(id, n_bytes)))
    }

    fn copy_in(&self, dst: &mut Blob, src: &[u8]) {
        assert_eq!(dst.n_bytes, src.len());
        dst.bytes_mut().copy_from_slice(src);
        self.record(Record::CopyIn {
            id: dst.id,
            n_bytes: src.len(),
        })
    }

    fn copy_out(&self, src: &Blob, dst: &mut [u8]) {
        assert_eq!(src.n_bytes, dst.len());
        dst.copy_from_slice(src.bytes());
        self.record(Record::CopyOut {
            id: src.id,
            n_bytes: dst.len(),
        })
    }

    fn free(&self, blob: Blob) {
        {
            let mut internal = self.internal.borrow_mut();
            let n_bytes = internal.live.remove(&blob.id);
            assert_eq!(n_bytes, Some(blob.n_bytes), "unknown blob %{}", blob.id);
            internal.used -= blob.n_bytes;
        }
        self.record(Record::Free { id: blob.id })
    }

    fn launch(&self, name: &str) {
        self.record(Record::Launch(name.into()))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alloc { id, n_bytes } => write!(f, "alloc    %{id} {n_bytes} bytes"),
            Self::CopyIn { id, n_bytes } => write!(f, "copy-in  %{id} {n_bytes} bytes"),
            Self::CopyOut { id, n_bytes } => write!(f, "copy-out %{id} {n_bytes} bytes"),
            Self::Free { id } => write!(f, "free     %{id}"),
            Self::Launch(name) => write!(f, "launch   {name}"),
        }
    }
}

impl fmt::Display for TestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let internal = self.internal.borrow();
        let width = internal.records.len() / 10 + 1;
        for (i, record) in internal.records.iter().enumerate() {
            writeln!(f, "[{}] {i:0width$} {record}", self.device)?
        }
        Ok(())
    }
}
