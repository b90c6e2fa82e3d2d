//! Raster element traits for generic cell values

use num_traits::Float;
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Covers elevation grids (floats), classified grids (integers) and
/// channel masks (`bool` or 0/1 integers).
pub trait RasterElement: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether the value marks a set cell in a mask (non-zero / `true`)
    fn is_truthy(&self) -> bool;

    /// Lossy conversion to f64
    fn as_f64(self) -> f64;
}

/// Floating point cell types that can hold elevations and heights.
pub trait Elevation: RasterElement + Float {}

macro_rules! impl_raster_element_int {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.is_some_and(|nd| *self == nd)
            }

            fn is_truthy(&self) -> bool {
                *self != 0
            }

            fn as_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }

            fn is_truthy(&self) -> bool {
                !self.is_nan() && *self != 0.0
            }

            fn as_f64(self) -> f64 {
                self as f64
            }
        }

        impl Elevation for $t {}
    };
}

impl_raster_element_int!(i8);
impl_raster_element_int!(i16);
impl_raster_element_int!(i32);
impl_raster_element_int!(i64);
impl_raster_element_int!(u8);
impl_raster_element_int!(u16);
impl_raster_element_int!(u32);
impl_raster_element_int!(u64);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);

impl RasterElement for bool {
    fn default_nodata() -> Self {
        false
    }

    fn is_nodata(&self, nodata: Option<Self>) -> bool {
        nodata.is_some_and(|nd| *self == nd)
    }

    fn is_truthy(&self) -> bool {
        *self
    }

    fn as_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }
}
