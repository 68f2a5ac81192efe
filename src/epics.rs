//! Protocol buffer messages of the Archiver Appliance PB wire format.
//!
//! Mirrors `EPICSEvent.proto`; unknown fields (repeat counts, field values,
//! the unused header slots) are skipped by the decoder.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PayloadType {
    ScalarString = 0,
    ScalarShort = 1,
    ScalarFloat = 2,
    ScalarEnum = 3,
    ScalarByte = 4,
    ScalarInt = 5,
    ScalarDouble = 6,
    WaveformString = 7,
    WaveformShort = 8,
    WaveformFloat = 9,
    WaveformEnum = 10,
    WaveformByte = 11,
    WaveformInt = 12,
    WaveformDouble = 13,
    V4GenericBytes = 14,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FieldValue {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(string, required, tag = "2")]
    pub val: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PayloadInfo {
    #[prost(enumeration = "PayloadType", required, tag = "1")]
    pub r#type: i32,
    #[prost(string, required, tag = "2")]
    pub pvname: String,
    #[prost(int32, required, tag = "3")]
    pub year: i32,
    #[prost(int32, optional, tag = "4")]
    pub element_count: Option<i32>,
    #[prost(message, repeated, tag = "15")]
    pub headers: Vec<FieldValue>,
}

macro_rules! sample_message {
    ($name:ident, $ty:ty, $($val:tt)+) => {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct $name {
            #[prost(uint32, required, tag = "1")]
            pub secondsintoyear: u32,
            #[prost(uint32, required, tag = "2")]
            pub nano: u32,
            #[prost($($val)+, tag = "3")]
            pub val: $ty,
            #[prost(int32, optional, tag = "4")]
            pub severity: Option<i32>,
            #[prost(int32, optional, tag = "5")]
            pub status: Option<i32>,
        }

        impl Sample for $name {
            fn seconds_into_year(&self) -> u32 {
                self.secondsintoyear
            }

            fn nanos(&self) -> u32 {
                self.nano
            }

            fn severity_code(&self) -> i32 {
                self.severity.unwrap_or(0)
            }

            fn status_code(&self) -> i32 {
                self.status.unwrap_or(0)
            }
        }
    };
}

/// Timestamp and alarm fields shared by every sample message.
pub trait Sample {
    fn seconds_into_year(&self) -> u32;
    fn nanos(&self) -> u32;
    fn severity_code(&self) -> i32;
    fn status_code(&self) -> i32;
}

/// Samples whose value is a single number.
pub trait NumericSample: Sample {
    fn val_as_f64(&self) -> f64;
}

/// Samples whose value is a waveform.
pub trait ArraySample: Sample {
    fn vals_as_f64(&self) -> Vec<f64>;
}

sample_message!(ScalarString, String, string, required);
sample_message!(ScalarShort, i32, sint32, required);
sample_message!(ScalarFloat, f32, float, required);
sample_message!(ScalarEnum, i32, sint32, required);
sample_message!(ScalarByte, Vec<u8>, bytes = "vec", required);
sample_message!(ScalarInt, i32, sfixed32, required);
sample_message!(ScalarDouble, f64, double, required);
sample_message!(VectorString, Vec<String>, string, repeated);
sample_message!(VectorShort, Vec<i32>, sint32, repeated, packed = "true");
sample_message!(VectorFloat, Vec<f32>, float, repeated, packed = "true");
sample_message!(VectorEnum, Vec<i32>, sint32, repeated, packed = "true");
sample_message!(VectorChar, Vec<u8>, bytes = "vec", required);
sample_message!(VectorInt, Vec<i32>, sfixed32, repeated, packed = "true");
sample_message!(VectorDouble, Vec<f64>, double, repeated, packed = "true");

impl NumericSample for ScalarByte {
    fn val_as_f64(&self) -> f64 {
        self.val.first().map(|b| *b as f64).unwrap_or(0.0)
    }
}

impl NumericSample for ScalarShort {
    fn val_as_f64(&self) -> f64 {
        self.val as f64
    }
}

impl NumericSample for ScalarInt {
    fn val_as_f64(&self) -> f64 {
        self.val as f64
    }
}

impl NumericSample for ScalarEnum {
    fn val_as_f64(&self) -> f64 {
        self.val as f64
    }
}

impl NumericSample for ScalarFloat {
    fn val_as_f64(&self) -> f64 {
        self.val as f64
    }
}

impl NumericSample for ScalarDouble {
    fn val_as_f64(&self) -> f64 {
        self.val
    }
}

impl ArraySample for VectorChar {
    fn vals_as_f64(&self) -> Vec<f64> {
        self.val.iter().map(|v| *v as f64).collect()
    }
}

impl ArraySample for VectorShort {
    fn vals_as_f64(&self) -> Vec<f64> {
        self.val.iter().map(|v| *v as f64).collect()
    }
}

impl ArraySample for VectorInt {
    fn vals_as_f64(&self) -> Vec<f64> {
        self.val.iter().map(|v| *v as f64).collect()
    }
}

impl ArraySample for VectorEnum {
    fn vals_as_f64(&self) -> Vec<f64> {
        self.val.iter().map(|v| *v as f64).collect()
    }
}

impl ArraySample for VectorFloat {
    fn vals_as_f64(&self) -> Vec<f64> {
        self.val.iter().map(|v| *v as f64).collect()
    }
}

impl ArraySample for VectorDouble {
    fn vals_as_f64(&self) -> Vec<f64> {
        self.val.clone()
    }
}
