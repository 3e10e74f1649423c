use crate::{AccessMode, Element, Mapper, Mode, Mutable, Read, mode::sealed::HostSlice};
use std::{
    fmt,
    marker::PhantomData,
    ops::{Index, IndexMut},
    ptr::NonNull,
    slice,
};

/// 带访问模式的数据访问器。
///
/// 访问器只记录用户数据区的起始地址和长度，不分配也不释放数据。
/// 访问模式 `A` 决定访问器提供的能力：[`Read`] 只能读，其他模式可读写。
/// 只有为 `(A, T)` 声明过映射规则（[`Mapper`]）的组合才能构造访问器。
///
/// ```compile_fail
/// use accessor::{Accessor, Read};
///
/// let data = [1, 2, 3];
/// let mut acc = Accessor::<Read, i32>::new(&data);
/// acc[0] = 9;
/// ```
///
/// 未声明映射规则的组合无法构造访问器：
///
/// ```compile_fail
/// use accessor::{Accessor, Read};
///
/// let data = [0u8; 4];
/// let acc = Accessor::<Read, u8>::new(&data);
/// ```
///
/// [`Read`] 访问器只给出 `*const T`：
///
/// ```compile_fail
/// use accessor::{Accessor, Read};
///
/// let data = [1.0f32; 4];
/// let acc = Accessor::<Read, f32>::new(&data);
/// let ptr: *mut f32 = acc.data();
/// ```
pub struct Accessor<'a, A: AccessMode, T> {
    data: NonNull<T>,
    len: usize,
    _phantom: PhantomData<(&'a mut [T], A)>,
}

unsafe impl<A: AccessMode, T: Sync> Sync for Accessor<'_, A, T> {}
unsafe impl<A: AccessMode, T: Send + Sync> Send for Accessor<'_, A, T> {}

impl<'a, A: AccessMode, T: Mapper<A> + 'a> Accessor<'a, A, T> {
    /// 包装宿主数据区。[`Read`] 模式借用 `&[T]`，其他模式借用 `&mut [T]`。
    pub fn new(data: A::Slice<'a, T>) -> Self {
        let (data, len) = data.into_raw();
        Self {
            data,
            len,
            _phantom: PhantomData,
        }
    }

    /// 从裸指针和长度构造访问器。
    ///
    /// # Safety
    ///
    /// `[data, data + len)` 必须在 `'a` 内有效且已初始化。
    /// 对于可变模式，`'a` 内不得通过其他途径访问这段数据。
    pub const unsafe fn from_raw_parts(data: NonNull<T>, len: usize) -> Self {
        Self {
            data,
            len,
            _phantom: PhantomData,
        }
    }
}

impl<A: AccessMode, T> Accessor<'_, A, T> {
    pub const fn mode(&self) -> Mode {
        A::MODE
    }

    /// 数据区的元素数量。
    pub const fn size(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 数据区的起始地址。[`Read`] 模式为 `*const T`，其他模式为 `*mut T`。
    pub fn begin(&self) -> A::Ptr<T> {
        A::ptr(self.data)
    }

    /// 数据区的结束地址。
    pub fn end(&self) -> A::Ptr<T> {
        A::ptr(unsafe { self.data.add(self.len) })
    }

    pub fn data(&self) -> A::Ptr<T> {
        A::ptr(self.data)
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// 不检查边界的元素访问。
    ///
    /// # Safety
    ///
    /// `index` 必须小于 [`Accessor::size`]。
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(index < self.len);
        unsafe { &*self.data.as_ptr().add(index) }
    }
}

impl<A: Mutable, T> Accessor<'_, A, T> {
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// 不检查边界的可变元素访问。
    ///
    /// # Safety
    ///
    /// `index` 必须小于 [`Accessor::size`]。
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.len);
        unsafe { &mut *self.data.as_ptr().add(index) }
    }
}

impl<T> Clone for Accessor<'_, Read, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Accessor<'_, Read, T> {}

impl<A: AccessMode, T> Index<usize> for Accessor<'_, A, T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<A: Mutable, T> IndexMut<usize> for Accessor<'_, A, T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}

impl<'s, A: AccessMode, T> IntoIterator for &'s Accessor<'_, A, T> {
    type Item = &'s T;
    type IntoIter = slice::Iter<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'s, A: Mutable, T> IntoIterator for &'s mut Accessor<'_, A, T> {
    type Item = &'s mut T;
    type IntoIter = slice::IterMut<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<A: AccessMode, T: Element> fmt::Debug for Accessor<'_, A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Accessor<{}, {}>[{}] @ {:p}",
            A::MODE,
            T::NAME,
            self.len,
            self.data
        )
    }
}

#[cfg(test)]
mod test {
    use super::Accessor;
    use crate::{Mode, Read, ReadWrite, Temporary, Write};
    use std::ptr;

    #[test]
    fn test_size() {
        let data = [1.0f32; 7];
        let acc = Accessor::<Read, f32>::new(&data);
        assert_eq!(acc.size(), 7);
        assert!(!acc.is_empty());
        assert_eq!(acc.mode(), Mode::Read)
    }

    #[test]
    fn test_bounds() {
        let mut data = [0.0f64; 5];
        let begin = data.as_ptr();

        let acc = Accessor::<Read, f64>::new(&data);
        assert_eq!(acc.begin(), begin);
        assert_eq!(acc.end(), begin.wrapping_add(5));
        assert_eq!(acc.data(), begin);

        let acc = Accessor::<Write, f64>::new(&mut data);
        assert_eq!(acc.begin().cast_const(), begin);
        assert_eq!(acc.end().cast_const(), begin.wrapping_add(5));

        let acc = Accessor::<ReadWrite, f64>::new(&mut data);
        assert_eq!(acc.data().cast_const(), begin);

        let acc = Accessor::<Temporary, f64>::new(&mut data);
        assert_eq!(acc.end().cast_const(), begin.wrapping_add(5))
    }

    #[test]
    fn test_pointer_mutability() {
        let mut data = [1i32, 2, 3];

        let acc = Accessor::<Write, i32>::new(&mut data);
        let ptr: *mut i32 = acc.data();
        unsafe { ptr.add(1).write(20) };
        assert_eq!(acc[1], 20);

        let acc = Accessor::<ReadWrite, i32>::new(&mut data);
        let end: *mut i32 = acc.end();
        unsafe { end.sub(1).write(30) };
        assert_eq!(acc.as_slice(), [1, 20, 30]);

        let acc = Accessor::<Read, i32>::new(&data);
        let ptr: *const i32 = acc.begin();
        assert_eq!(unsafe { *ptr.add(2) }, 30)
    }

    #[test]
    fn test_empty() {
        let data: [i32; 0] = [];
        let acc = Accessor::<Read, i32>::new(&data);
        assert!(acc.is_empty());
        assert_eq!(acc.begin(), acc.end());
        assert_eq!(acc.iter().count(), 0);

        let mut data: Vec<f32> = Vec::new();
        let acc = Accessor::<Write, f32>::new(&mut data);
        assert_eq!(acc.size(), 0);
        assert_eq!(acc.begin(), acc.end())
    }

    #[test]
    fn test_alias() {
        let data = [3, 1, 4, 1, 5];
        let acc = Accessor::<Read, i32>::new(&data);
        for (i, x) in data.iter().enumerate() {
            assert!(ptr::eq(&acc[i], x))
        }
        assert!(ptr::eq(acc.as_slice(), &data[..]))
    }

    #[test]
    fn test_write_through() {
        let mut buffer = [1, 2, 3];
        let mut w = Accessor::<Write, i32>::new(&mut buffer);
        w[1] = 99;
        assert_eq!(buffer, [1, 99, 3]);

        let mut rw = Accessor::<ReadWrite, i32>::new(&mut buffer);
        for x in &mut rw {
            *x *= 2
        }
        *rw.get_mut(0).unwrap() += 1;
        assert_eq!(buffer, [3, 198, 6]);

        let mut tmp = Accessor::<Temporary, i32>::new(&mut buffer);
        unsafe { *tmp.get_unchecked_mut(2) = -1 };
        tmp.as_mut_slice()[0] = 0;
        assert_eq!(buffer, [0, 198, -1])
    }

    #[test]
    fn test_checked() {
        let data = [1.5f32, 2.5];
        let acc = Accessor::<Read, f32>::new(&data);
        assert_eq!(acc.get(1), Some(&2.5));
        assert_eq!(acc.get(2), None);
        assert_eq!(unsafe { *acc.get_unchecked(0) }, 1.5)
    }

    #[test]
    #[should_panic]
    fn test_out_of_range() {
        let mut data = [0i32; 3];
        let mut acc = Accessor::<Write, i32>::new(&mut data);
        acc[3] = 1
    }

    #[test]
    fn test_copy() {
        let data = [1, 2, 3];
        let a = Accessor::<Read, i32>::new(&data);
        let b = a;
        assert_eq!(a.begin(), b.begin());
        assert_eq!(a.iter().sum::<i32>(), b.iter().sum::<i32>())
    }

    #[test]
    fn test_raw_parts() {
        let mut data = vec![0.0f64; 4];
        let ptr = ptr::NonNull::new(data.as_mut_ptr()).unwrap();
        let mut acc = unsafe { Accessor::<ReadWrite, f64>::from_raw_parts(ptr, data.len()) };
        acc[3] = 0.5;
        assert_eq!(acc.size(), 4);
        assert_eq!(data, [0.0, 0.0, 0.0, 0.5])
    }

    #[test]
    fn test_vec_add() {
        let a = (1..=10).collect::<Vec<i32>>();
        let b = (1..=10).rev().collect::<Vec<i32>>();
        let mut c = vec![0i32; 10];

        let acc_a = Accessor::<Read, i32>::new(&a);
        let acc_b = Accessor::<Read, i32>::new(&b);
        let mut acc_c = Accessor::<Write, i32>::new(&mut c);
        for i in 0..acc_c.size() {
            acc_c[i] = acc_a[i] + acc_b[i]
        }

        assert_eq!(c, [11; 10])
    }

    #[test]
    fn test_debug() {
        let data = [0.0f32; 3];
        let acc = Accessor::<Read, f32>::new(&data);
        let text = format!("{acc:?}");
        assert!(text.starts_with("Accessor<read, f32>[3] @ "))
    }
}
