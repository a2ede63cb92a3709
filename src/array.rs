//! Device-affine typed arrays.
//!
//! An [`Array`] is the value every kernel consumes and produces. Data is
//! stored row-major: a 1-D array has dims `[n]`, a 2-D array has dims
//! `[rows, cols]` where each row is one channel. The [`DeviceId`] of the
//! device that produced the array travels with it.

use crate::backend::DeviceId;
use crate::dtype::{DType, Element};
use crate::error::{BlockError, Result};
use crate::value::Value;
use num_complex::{Complex, Complex32, Complex64};
use num_traits::AsPrimitive;

/// Typed element storage, one variant per [`DType`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    ComplexFloat32(Vec<Complex32>),
    ComplexFloat64(Vec<Complex64>),
}

/// Evaluates `$body` with `$v` bound to the inner vector, whatever its type.
macro_rules! with_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            $crate::array::ArrayData::Int8($v) => $body,
            $crate::array::ArrayData::Int16($v) => $body,
            $crate::array::ArrayData::Int32($v) => $body,
            $crate::array::ArrayData::Int64($v) => $body,
            $crate::array::ArrayData::UInt8($v) => $body,
            $crate::array::ArrayData::UInt16($v) => $body,
            $crate::array::ArrayData::UInt32($v) => $body,
            $crate::array::ArrayData::UInt64($v) => $body,
            $crate::array::ArrayData::Float32($v) => $body,
            $crate::array::ArrayData::Float64($v) => $body,
            $crate::array::ArrayData::ComplexFloat32($v) => $body,
            $crate::array::ArrayData::ComplexFloat64($v) => $body,
        }
    };
}

/// Evaluates `$body` with `$t` naming the Rust element type of `$dtype`.
macro_rules! with_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            $crate::dtype::DType::Int8 => { type $t = i8; $body }
            $crate::dtype::DType::Int16 => { type $t = i16; $body }
            $crate::dtype::DType::Int32 => { type $t = i32; $body }
            $crate::dtype::DType::Int64 => { type $t = i64; $body }
            $crate::dtype::DType::UInt8 => { type $t = u8; $body }
            $crate::dtype::DType::UInt16 => { type $t = u16; $body }
            $crate::dtype::DType::UInt32 => { type $t = u32; $body }
            $crate::dtype::DType::UInt64 => { type $t = u64; $body }
            $crate::dtype::DType::Float32 => { type $t = f32; $body }
            $crate::dtype::DType::Float64 => { type $t = f64; $body }
            $crate::dtype::DType::ComplexFloat32 => { type $t = ::num_complex::Complex32; $body }
            $crate::dtype::DType::ComplexFloat64 => { type $t = ::num_complex::Complex64; $body }
        }
    };
}

pub(crate) use {with_data, with_dtype};

impl ArrayData {
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::Int8(_) => DType::Int8,
            ArrayData::Int16(_) => DType::Int16,
            ArrayData::Int32(_) => DType::Int32,
            ArrayData::Int64(_) => DType::Int64,
            ArrayData::UInt8(_) => DType::UInt8,
            ArrayData::UInt16(_) => DType::UInt16,
            ArrayData::UInt32(_) => DType::UInt32,
            ArrayData::UInt64(_) => DType::UInt64,
            ArrayData::Float32(_) => DType::Float32,
            ArrayData::Float64(_) => DType::Float64,
            ArrayData::ComplexFloat32(_) => DType::ComplexFloat32,
            ArrayData::ComplexFloat64(_) => DType::ComplexFloat64,
        }
    }

    pub fn len(&self) -> usize {
        with_data!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-filled storage of `len` elements.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        with_dtype!(dtype, T => <T as Element>::wrap(vec![<T as bytemuck::Zeroable>::zeroed(); len]))
    }

    /// Raw little-endian bytes of the elements.
    pub fn as_bytes(&self) -> &[u8] {
        with_data!(self, v => bytemuck::cast_slice(v.as_slice()))
    }

    /// Decodes raw bytes into typed storage; the byte length must be a
    /// whole number of elements.
    pub fn from_bytes(dtype: DType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % dtype.size() != 0 {
            return Err(BlockError::assertion(format!(
                "{} bytes is not a whole number of {dtype} elements",
                bytes.len()
            )));
        }
        Ok(with_dtype!(dtype, T => <T as Element>::wrap(bytemuck::pod_collect_to_vec::<u8, T>(bytes))))
    }

    /// Copies `len` elements starting at `start`.
    pub fn slice(&self, start: usize, len: usize) -> Result<Self> {
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.len())
            .ok_or_else(|| BlockError::assertion(format!("slice {start}+{len} out of {}", self.len())))?;
        Ok(with_data!(self, v => Element::wrap(v[start..end].to_vec())))
    }

    /// Concatenates storage of a single type.
    pub fn concat(parts: &[&ArrayData]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(BlockError::assertion("cannot concatenate zero arrays"));
        };
        let dtype = first.dtype();
        let total = parts.iter().map(|p| p.len()).sum();
        with_dtype!(dtype, T => {
            let mut out: Vec<T> = Vec::with_capacity(total);
            for part in parts {
                let slice = <T as Element>::slice(part).ok_or_else(|| {
                    BlockError::invalid(format!("cannot concatenate {} with {dtype}", part.dtype()))
                })?;
                out.extend_from_slice(slice);
            }
            Ok(<T as Element>::wrap(out))
        })
    }

    /// Converts every element to `to`.
    ///
    /// Real to complex sets the imaginary part to zero; complex to real keeps
    /// the real part. Float to integer truncates toward zero and saturates.
    pub fn cast(&self, to: DType) -> Self {
        if self.dtype() == to {
            return self.clone();
        }
        match self {
            ArrayData::Int8(v) => cast_real(v, to),
            ArrayData::Int16(v) => cast_real(v, to),
            ArrayData::Int32(v) => cast_real(v, to),
            ArrayData::Int64(v) => cast_real(v, to),
            ArrayData::UInt8(v) => cast_real(v, to),
            ArrayData::UInt16(v) => cast_real(v, to),
            ArrayData::UInt32(v) => cast_real(v, to),
            ArrayData::UInt64(v) => cast_real(v, to),
            ArrayData::Float32(v) => cast_real(v, to),
            ArrayData::Float64(v) => cast_real(v, to),
            ArrayData::ComplexFloat32(v) => cast_complex(v, to),
            ArrayData::ComplexFloat64(v) => cast_complex(v, to),
        }
    }
}

/// Bound set for scalars castable to every real element type.
pub(crate) trait AsAnyPrimitive:
    Copy
    + 'static
    + AsPrimitive<i8>
    + AsPrimitive<i16>
    + AsPrimitive<i32>
    + AsPrimitive<i64>
    + AsPrimitive<u8>
    + AsPrimitive<u16>
    + AsPrimitive<u32>
    + AsPrimitive<u64>
    + AsPrimitive<f32>
    + AsPrimitive<f64>
{
}

impl<T> AsAnyPrimitive for T where
    T: Copy
        + 'static
        + AsPrimitive<i8>
        + AsPrimitive<i16>
        + AsPrimitive<i32>
        + AsPrimitive<i64>
        + AsPrimitive<u8>
        + AsPrimitive<u16>
        + AsPrimitive<u32>
        + AsPrimitive<u64>
        + AsPrimitive<f32>
        + AsPrimitive<f64>
{
}

macro_rules! map_as {
    ($v:expr, $to:ty) => {
        $v.iter().map(|&x| AsPrimitive::<$to>::as_(x)).collect()
    };
}

fn cast_real<S: AsAnyPrimitive>(v: &[S], to: DType) -> ArrayData {
    match to {
        DType::Int8 => ArrayData::Int8(map_as!(v, i8)),
        DType::Int16 => ArrayData::Int16(map_as!(v, i16)),
        DType::Int32 => ArrayData::Int32(map_as!(v, i32)),
        DType::Int64 => ArrayData::Int64(map_as!(v, i64)),
        DType::UInt8 => ArrayData::UInt8(map_as!(v, u8)),
        DType::UInt16 => ArrayData::UInt16(map_as!(v, u16)),
        DType::UInt32 => ArrayData::UInt32(map_as!(v, u32)),
        DType::UInt64 => ArrayData::UInt64(map_as!(v, u64)),
        DType::Float32 => ArrayData::Float32(map_as!(v, f32)),
        DType::Float64 => ArrayData::Float64(map_as!(v, f64)),
        DType::ComplexFloat32 => ArrayData::ComplexFloat32(
            v.iter().map(|&x| Complex32::new(AsPrimitive::<f32>::as_(x), 0.0)).collect(),
        ),
        DType::ComplexFloat64 => ArrayData::ComplexFloat64(
            v.iter().map(|&x| Complex64::new(AsPrimitive::<f64>::as_(x), 0.0)).collect(),
        ),
    }
}

fn cast_complex<F: AsAnyPrimitive>(v: &[Complex<F>], to: DType) -> ArrayData {
    match to {
        DType::ComplexFloat32 => ArrayData::ComplexFloat32(
            v.iter()
                .map(|c| Complex32::new(AsPrimitive::<f32>::as_(c.re), AsPrimitive::<f32>::as_(c.im)))
                .collect(),
        ),
        DType::ComplexFloat64 => ArrayData::ComplexFloat64(
            v.iter()
                .map(|c| Complex64::new(AsPrimitive::<f64>::as_(c.re), AsPrimitive::<f64>::as_(c.im)))
                .collect(),
        ),
        real => {
            let re: Vec<F> = v.iter().map(|c| c.re).collect();
            cast_real(&re, real)
        }
    }
}

/// A typed 1-D or 2-D array bound to the device that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    data: ArrayData,
    dims: Vec<usize>,
    device: DeviceId,
}

impl Array {
    /// Wraps storage with explicit dims.
    ///
    /// # Errors
    /// - dims are not 1-D or 2-D
    /// - the product of dims differs from the element count
    pub fn new(data: ArrayData, dims: Vec<usize>, device: DeviceId) -> Result<Self> {
        if dims.is_empty() || dims.len() > 2 {
            return Err(BlockError::invalid(format!(
                "arrays must be 1-D or 2-D, got {} dims",
                dims.len()
            )));
        }
        let expected: usize = dims.iter().product();
        if expected != data.len() {
            return Err(BlockError::assertion(format!(
                "dims {dims:?} do not match {} elements",
                data.len()
            )));
        }
        Ok(Self { data, dims, device })
    }

    /// A 1-D array over `data`.
    pub fn from_data(data: ArrayData, device: DeviceId) -> Self {
        let dims = vec![data.len()];
        Self { data, dims, device }
    }

    pub fn from_vec<T: Element>(values: Vec<T>, device: DeviceId) -> Self {
        Self::from_data(T::wrap(values), device)
    }

    /// A 2-D array with one row per inner vector.
    pub fn from_rows<T: Element>(rows: Vec<Vec<T>>, device: DeviceId) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(BlockError::invalid("rows must have equal length"));
        }
        let dims = vec![rows.len(), cols];
        Self::new(T::wrap(rows.concat()), dims, device)
    }

    /// An array of `dims` filled with `value` converted to `dtype`.
    pub fn full(value: &Value, dtype: DType, dims: Vec<usize>, device: DeviceId) -> Result<Self> {
        let len = dims.iter().product();
        let data = with_dtype!(dtype, T => <T as Element>::wrap(vec![<T as Element>::from_value(value)?; len]));
        Self::new(data, dims, device)
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn numdims(&self) -> usize {
        self.dims.len()
    }

    pub fn elements(&self) -> usize {
        self.data.len()
    }

    /// Number of rows (channels); a 1-D array is one row.
    pub fn rows(&self) -> usize {
        if self.dims.len() == 2 { self.dims[0] } else { 1 }
    }

    /// Elements per row.
    pub fn cols(&self) -> usize {
        *self.dims.last().unwrap_or(&0)
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    /// Copies the elements out as `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.as_slice::<T>().map(<[T]>::to_vec).ok_or_else(|| {
            BlockError::invalid(format!("array holds {}, not {}", self.dtype(), T::DTYPE))
        })
    }

    /// Same data under new dims.
    pub fn reshape(self, dims: Vec<usize>) -> Result<Self> {
        Self::new(self.data, dims, self.device)
    }

    /// One row as a 1-D array.
    pub fn row(&self, index: usize) -> Result<Self> {
        if index >= self.rows() {
            return Err(BlockError::assertion(format!(
                "row {index} out of {} rows",
                self.rows()
            )));
        }
        let cols = self.cols();
        Ok(Self::from_data(self.data.slice(index * cols, cols)?, self.device))
    }

    /// Iterates rows as 1-D arrays.
    pub fn row_arrays(&self) -> Result<Vec<Self>> {
        (0..self.rows()).map(|r| self.row(r)).collect()
    }

    /// Stacks equal-length 1-D arrays into a `[rows, cols]` array.
    pub fn stack_rows(rows: &[Array]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(BlockError::assertion("cannot stack zero rows"));
        };
        let cols = first.elements();
        for row in rows {
            if row.device != first.device {
                return Err(BlockError::DeviceMismatch(format!(
                    "cannot stack {} with {}",
                    row.device, first.device
                )));
            }
            if row.elements() != cols {
                return Err(BlockError::assertion("stacked rows must have equal length"));
            }
        }
        let parts: Vec<&ArrayData> = rows.iter().map(|r| &r.data).collect();
        Self::new(ArrayData::concat(&parts)?, vec![rows.len(), cols], first.device)
    }

    /// Converts every element to `to`, keeping dims and device.
    pub fn cast(&self, to: DType) -> Self {
        Self { data: self.data.cast(to), dims: self.dims.clone(), device: self.device }
    }

    /// Same dims and device, different storage.
    pub(crate) fn with_data(&self, data: ArrayData) -> Result<Self> {
        Self::new(data, self.dims.clone(), self.device)
    }

    /// Whether any element equals zero.
    pub fn any_zero(&self) -> bool {
        match &self.data {
            ArrayData::Int8(v) => v.contains(&0),
            ArrayData::Int16(v) => v.contains(&0),
            ArrayData::Int32(v) => v.contains(&0),
            ArrayData::Int64(v) => v.contains(&0),
            ArrayData::UInt8(v) => v.contains(&0),
            ArrayData::UInt16(v) => v.contains(&0),
            ArrayData::UInt32(v) => v.contains(&0),
            ArrayData::UInt64(v) => v.contains(&0),
            ArrayData::Float32(v) => v.contains(&0.0),
            ArrayData::Float64(v) => v.contains(&0.0),
            ArrayData::ComplexFloat32(v) => v.iter().any(|c| c.re == 0.0 && c.im == 0.0),
            ArrayData::ComplexFloat64(v) => v.iter().any(|c| c.re == 0.0 && c.im == 0.0),
        }
    }
}
