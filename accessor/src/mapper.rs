use crate::{AccessMode, Element, Error, Mode, Read, ReadWrite, Result, Temporary, Write};
use digit_layout::DigitLayout;
use std::{any::TypeId, fmt, slice};

/// 数据传输行为。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Transfer {
    /// 进入区域前拷入设备。
    To,
    /// 离开区域时拷回宿主。
    From,
    /// 进入时拷入，离开时拷回。
    ToFrom,
    /// 仅分配设备存储。
    Alloc,
}

impl Transfer {
    pub const fn copies_in(self) -> bool {
        matches!(self, Self::To | Self::ToFrom)
    }

    pub const fn copies_out(self) -> bool {
        matches!(self, Self::From | Self::ToFrom)
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::To => "to",
            Self::From => "from",
            Self::ToFrom => "tofrom",
            Self::Alloc => "alloc",
        })
    }
}

/// `(A, Self)` 组合的映射规则。
///
/// 只有实现了 `Mapper<A>` 的元素类型才能构造 `A` 模式的访问器。
pub trait Mapper<A: AccessMode>: Element {
    const TRANSFER: Transfer;
}

/// 为元素类型声明映射规则，传输行为取访问模式的默认值。
///
/// 不指定模式时为全部四种模式声明；指定时只声明列出的模式。
#[macro_export]
macro_rules! mapper {
    ($ty:ty: $( $mode:ident ),+ $(,)?) => {
        $(
            impl $crate::Mapper<$crate::$mode> for $ty {
                const TRANSFER: $crate::Transfer =
                    <$crate::$mode as $crate::AccessMode>::MODE.transfer();
            }
        )+
    };
    ($ty:ty) => {
        $crate::mapper!($ty: Read, Write, ReadWrite, Temporary);
    };
}

mapper!(i32);
mapper!(f32);
mapper!(f64);

/// 映射表中的一条规则。
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub mode: Mode,
    /// 元素类型，规则按 `(mode, ty)` 区分。
    pub ty: TypeId,
    pub dt: DigitLayout,
    pub name: &'static str,
    pub transfer: Transfer,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            mode,
            name,
            transfer,
            ..
        } = self;
        write!(f, "declare mapper({mode}, {name}) map({transfer})")
    }
}

/// 映射规则表。
///
/// 区域按访问器的 `(模式, 元素类型)` 在表中查找传输行为。
/// 数字布局相同的不同元素类型各有各的规则。
#[derive(Clone)]
pub struct MapperTable {
    rules: Vec<Rule>,
}

impl Default for MapperTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MapperTable {
    /// 空表。
    pub const fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// 内置的 `i32`、`f32`、`f64` 在四种模式下的 12 条规则。
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table
            .register_all::<i32>()
            .register_all::<f32>()
            .register_all::<f64>();
        table
    }

    /// 登记 `(A, T)` 的规则，已存在时替换。
    pub fn register<A: AccessMode, T: Mapper<A>>(&mut self) -> &mut Self {
        let rule = Rule {
            mode: A::MODE,
            ty: TypeId::of::<T>(),
            dt: T::DT,
            name: T::NAME,
            transfer: T::TRANSFER,
        };
        match self
            .rules
            .iter_mut()
            .find(|r| r.mode == rule.mode && r.ty == rule.ty)
        {
            Some(r) => *r = rule,
            None => self.rules.push(rule),
        }
        self
    }

    /// 登记 `T` 在全部四种模式下的规则。
    pub fn register_all<T>(&mut self) -> &mut Self
    where
        T: Mapper<Read> + Mapper<Write> + Mapper<ReadWrite> + Mapper<Temporary>,
    {
        self.register::<Read, T>()
            .register::<Write, T>()
            .register::<ReadWrite, T>()
            .register::<Temporary, T>()
    }

    pub fn get(&self, mode: Mode, ty: TypeId) -> Option<Transfer> {
        self.rules
            .iter()
            .find(|r| r.mode == mode && r.ty == ty)
            .map(|r| r.transfer)
    }

    pub fn lookup<A: AccessMode, T: Element>(&self) -> Result<Transfer> {
        self.get(A::MODE, TypeId::of::<T>()).ok_or(Error::Unmapped {
            mode: A::MODE,
            name: T::NAME,
        })
    }

    pub fn rules(&self) -> slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Display for MapperTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            writeln!(f, "{rule}")?
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Mapper, MapperTable, Transfer};
    use crate::{Element, Error, Mode, Read, ReadWrite, Temporary, Write};
    use bytemuck::{Pod, Zeroable};
    use digit_layout::{DigitLayout, types};
    use std::any::TypeId;

    #[test]
    fn test_builtin() {
        let table = MapperTable::default();
        assert_eq!(table.len(), 12);

        for ty in [TypeId::of::<i32>(), TypeId::of::<f32>(), TypeId::of::<f64>()] {
            assert_eq!(table.get(Mode::Read, ty), Some(Transfer::To));
            assert_eq!(table.get(Mode::Write, ty), Some(Transfer::From));
            assert_eq!(table.get(Mode::ReadWrite, ty), Some(Transfer::ToFrom));
            assert_eq!(table.get(Mode::Temporary, ty), Some(Transfer::Alloc))
        }
        assert!(table.rules().filter(|r| r.name == "f32").all(|r| r.dt == f32::DT))
    }

    #[test]
    fn test_copy_direction() {
        let table = MapperTable::builtin();
        let dirs = table
            .rules()
            .filter(|r| r.name == "f64")
            .map(|r| (r.transfer.copies_in(), r.transfer.copies_out()))
            .collect::<Vec<_>>();
        assert_eq!(dirs, [(true, false), (false, true), (true, true), (false, false)])
    }

    #[test]
    fn test_register() {
        let mut table = MapperTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get(Mode::Read, TypeId::of::<f32>()), None);

        table.register::<Read, f32>().register::<Read, f32>();
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup::<Read, f32>(), Ok(Transfer::To));
        assert_eq!(
            table.lookup::<Temporary, f32>(),
            Err(Error::Unmapped {
                mode: Mode::Temporary,
                name: "f32",
            })
        );

        table.register_all::<i32>();
        assert_eq!(table.len(), 5);
        assert_eq!(table.lookup::<Write, i32>(), Ok(Transfer::From));
        assert_eq!(table.lookup::<ReadWrite, i32>(), Ok(Transfer::ToFrom))
    }

    #[test]
    fn test_same_layout() {
        #[derive(Clone, Copy, Pod, Zeroable)]
        #[repr(transparent)]
        struct Index(i32);

        impl Element for Index {
            const DT: DigitLayout = types::I32;
            const NAME: &'static str = "index";
        }

        impl Mapper<Read> for Index {
            const TRANSFER: Transfer = Transfer::Alloc;
        }

        let mut table = MapperTable::builtin();
        table.register::<Read, Index>();
        assert_eq!(table.len(), 13);
        assert_eq!(table.lookup::<Read, i32>(), Ok(Transfer::To));
        assert_eq!(table.lookup::<Read, Index>(), Ok(Transfer::Alloc));
        assert_eq!(
            table.lookup::<Write, Index>(),
            Err(Error::Unmapped {
                mode: Mode::Write,
                name: "index",
            })
        )
    }

    #[test]
    fn test_unmapped_message() {
        let err = MapperTable::new().lookup::<ReadWrite, f64>().unwrap_err();
        assert_eq!(err.to_string(), "no mapper declared for (read-write, f64)")
    }

    #[test]
    fn test_display() {
        let text = MapperTable::builtin().to_string();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[0], "declare mapper(read, i32) map(to)");
        assert_eq!(lines[3], "declare mapper(temporary, i32) map(alloc)");
        assert_eq!(lines[10], "declare mapper(read-write, f64) map(tofrom)")
    }
}
