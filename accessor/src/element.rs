use bytemuck::Pod;
use digit_layout::{DigitLayout, types};

/// 可被访问器包装、在宿主与设备之间按字节搬运的元素类型。
pub trait Element: Pod {
    const DT: DigitLayout;
    const NAME: &'static str;
}

macro_rules! element {
    ($( $ty:ty => $dt:ident ),+ $(,)?) => {
        $(
            impl Element for $ty {
                const DT: DigitLayout = types::$dt;
                const NAME: &'static str = stringify!($ty);
            }
        )+
    };
}

element! {
    i32 => I32,
    f32 => F32,
    f64 => F64,
}
