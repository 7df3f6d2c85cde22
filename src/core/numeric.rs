//! Pixel count types
//!
//! The numeric type of `pixels/count` is only known once a file is opened.
//! [`CountType`] is the runtime tag; [`Count`] is the compile-time
//! capability implemented for each supported primitive.

use hdf5::types::{FloatSize, IntSize, TypeDescriptor};
use hdf5::H5Type;
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

/// Runtime tag for the numeric type stored in `pixels/count`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl CountType {
    pub const ALL: [CountType; 10] = [
        CountType::I8,
        CountType::I16,
        CountType::I32,
        CountType::I64,
        CountType::U8,
        CountType::U16,
        CountType::U32,
        CountType::U64,
        CountType::F32,
        CountType::F64,
    ];

    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, CountType::F32 | CountType::F64)
    }

    #[inline]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            CountType::I8 | CountType::I16 | CountType::I32 | CountType::I64
        )
    }

    #[inline]
    pub fn is_unsigned(self) -> bool {
        !self.is_float() && !self.is_signed()
    }

    pub fn size_of(self) -> usize {
        match self {
            CountType::I8 | CountType::U8 => 1,
            CountType::I16 | CountType::U16 => 2,
            CountType::I32 | CountType::U32 | CountType::F32 => 4,
            CountType::I64 | CountType::U64 | CountType::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CountType::I8 => "int8",
            CountType::I16 => "int16",
            CountType::I32 => "int32",
            CountType::I64 => "int64",
            CountType::U8 => "uint8",
            CountType::U16 => "uint16",
            CountType::U32 => "uint32",
            CountType::U64 => "uint64",
            CountType::F32 => "float32",
            CountType::F64 => "float64",
        }
    }

    /// HDF5 type used when creating `pixels/count`
    pub fn type_descriptor(self) -> TypeDescriptor {
        match self {
            CountType::I8 => TypeDescriptor::Integer(IntSize::U1),
            CountType::I16 => TypeDescriptor::Integer(IntSize::U2),
            CountType::I32 => TypeDescriptor::Integer(IntSize::U4),
            CountType::I64 => TypeDescriptor::Integer(IntSize::U8),
            CountType::U8 => TypeDescriptor::Unsigned(IntSize::U1),
            CountType::U16 => TypeDescriptor::Unsigned(IntSize::U2),
            CountType::U32 => TypeDescriptor::Unsigned(IntSize::U4),
            CountType::U64 => TypeDescriptor::Unsigned(IntSize::U8),
            CountType::F32 => TypeDescriptor::Float(FloatSize::U4),
            CountType::F64 => TypeDescriptor::Float(FloatSize::U8),
        }
    }

    /// Match an HDF5 datatype onto one of the supported arms
    pub fn from_descriptor(desc: &TypeDescriptor) -> Option<Self> {
        let t = match desc {
            TypeDescriptor::Integer(IntSize::U1) => CountType::I8,
            TypeDescriptor::Integer(IntSize::U2) => CountType::I16,
            TypeDescriptor::Integer(IntSize::U4) => CountType::I32,
            TypeDescriptor::Integer(IntSize::U8) => CountType::I64,
            TypeDescriptor::Unsigned(IntSize::U1) => CountType::U8,
            TypeDescriptor::Unsigned(IntSize::U2) => CountType::U16,
            TypeDescriptor::Unsigned(IntSize::U4) => CountType::U32,
            TypeDescriptor::Unsigned(IntSize::U8) => CountType::U64,
            TypeDescriptor::Float(FloatSize::U4) => CountType::F32,
            TypeDescriptor::Float(FloatSize::U8) => CountType::F64,
            _ => return None,
        };
        Some(t)
    }

    /// Zero accumulator of the arm matching this type
    pub fn zero_sum(self) -> PixelSum {
        if self.is_float() {
            PixelSum::Float(0.0)
        } else if self.is_signed() {
            PixelSum::Int(0)
        } else {
            PixelSum::UInt(0)
        }
    }
}

impl fmt::Display for CountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = match s.to_ascii_lowercase().as_str() {
            "int8" | "i8" => CountType::I8,
            "int16" | "i16" => CountType::I16,
            "int32" | "i32" | "int" => CountType::I32,
            "int64" | "i64" => CountType::I64,
            "uint8" | "u8" => CountType::U8,
            "uint16" | "u16" => CountType::U16,
            "uint32" | "u32" => CountType::U32,
            "uint64" | "u64" => CountType::U64,
            "float32" | "f32" | "float" => CountType::F32,
            "float64" | "f64" | "double" => CountType::F64,
            other => return Err(format!("unsupported count type \"{}\"", other)),
        };
        Ok(t)
    }
}

/// 64-bit accumulator for `sum` and `cis` attributes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelSum {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl PixelSum {
    pub fn as_f64(self) -> f64 {
        match self {
            PixelSum::Int(v) => v as f64,
            PixelSum::UInt(v) => v as f64,
            PixelSum::Float(v) => v,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            PixelSum::Int(v) => v,
            PixelSum::UInt(v) => v as i64,
            PixelSum::Float(v) => v as i64,
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            PixelSum::Int(v) => v as u64,
            PixelSum::UInt(v) => v,
            PixelSum::Float(v) => v as u64,
        }
    }

    /// Add another accumulator, keeping the arm of `self`
    pub fn add_sum(&mut self, other: PixelSum) {
        match self {
            PixelSum::Int(s) => *s = s.wrapping_add(other.as_i64()),
            PixelSum::UInt(s) => *s = s.wrapping_add(other.as_u64()),
            PixelSum::Float(s) => *s += other.as_f64(),
        }
    }
}

impl fmt::Display for PixelSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelSum::Int(v) => write!(f, "{}", v),
            PixelSum::UInt(v) => write!(f, "{}", v),
            PixelSum::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Numeric capability required from pixel counts
pub trait Count:
    H5Type
    + Copy
    + Default
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Send
    + Sync
    + 'static
{
    const COUNT_TYPE: CountType;

    fn is_zero(self) -> bool;
    fn to_f64(self) -> f64;
    fn to_i64(self) -> i64;
    fn to_u64(self) -> u64;
    fn from_f64(v: f64) -> Self;

    /// `None` when an integer sum overflows
    fn checked_add(self, rhs: Self) -> Option<Self>;

    /// Add `self` to `acc` without leaving 64-bit arithmetic
    #[inline]
    fn accumulate(self, acc: &mut PixelSum) {
        match acc {
            PixelSum::Int(s) => *s = s.wrapping_add(self.to_i64()),
            PixelSum::UInt(s) => *s = s.wrapping_add(self.to_u64()),
            PixelSum::Float(s) => *s += self.to_f64(),
        }
    }
}

macro_rules! impl_count {
    ($t:ty, $tag:expr, $zero:expr) => {
        impl_count!($t, $tag, $zero, |a: $t, b: $t| a.checked_add(b));
    };
    ($t:ty, $tag:expr, $zero:expr, $add:expr) => {
        impl Count for $t {
            const COUNT_TYPE: CountType = $tag;

            #[inline]
            fn is_zero(self) -> bool {
                self == $zero
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn to_i64(self) -> i64 {
                self as i64
            }

            #[inline]
            fn to_u64(self) -> u64 {
                self as u64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $t
            }

            #[inline]
            fn checked_add(self, rhs: Self) -> Option<Self> {
                ($add)(self, rhs)
            }
        }
    };
}

impl_count!(i8, CountType::I8, 0);
impl_count!(i16, CountType::I16, 0);
impl_count!(i32, CountType::I32, 0);
impl_count!(i64, CountType::I64, 0);
impl_count!(u8, CountType::U8, 0);
impl_count!(u16, CountType::U16, 0);
impl_count!(u32, CountType::U32, 0);
impl_count!(u64, CountType::U64, 0);
impl_count!(f32, CountType::F32, 0.0, |a: f32, b: f32| Some(a + b));
impl_count!(f64, CountType::F64, 0.0, |a: f64, b: f64| Some(a + b));
