use crate::constants::NEWLINE_CHAR;
use crate::decode_helpers::{calc_time, unescape_line};
use crate::epics::*;
use crate::error::{ArchiverError, Result};
use crate::types::{ArchiverResponse, FieldName};
use crate::values::{Arrays, Enums, Scalars, SingleData, Strings, Values};
use prost::Message;
use serde_json::Value as JsonValue;
use tracing::{debug, error};

const SEVERITY_INVALID: i32 = 3;

#[derive(Debug, Clone, Copy)]
enum ChunkState {
    Idle,
    InChunk { payload_type: PayloadType, year: i32 },
}

struct Record<T> {
    value: T,
    severity: i32,
    status: i32,
    secs: u32,
    nanos: u32,
}

/// Incremental decoder for the archiver's PB stream.
///
/// Bytes are fed as they arrive. Raw newlines separate lines; the first line
/// of a chunk is a `PayloadInfo` header, the following lines are samples and
/// an empty line closes the chunk. Every chunk appends to the same container,
/// whose variant is chosen by the first header.
pub struct PbDecoder {
    field: FieldName,
    hide_invalid: bool,
    points_capacity: usize,
    line: Vec<u8>,
    received: bool,
    state: ChunkState,
    pvname: Option<String>,
    values: Option<Values>,
}

impl PbDecoder {
    pub fn new(field: FieldName, hide_invalid: bool, points_capacity: usize) -> Self {
        Self {
            field,
            hide_invalid,
            points_capacity,
            line: Vec::with_capacity(128),
            received: false,
            state: ChunkState::Idle,
            pvname: None,
            values: None,
        }
    }

    /// Decodes a complete response body.
    pub fn decode_response(mut self, raw_bytes: &[u8]) -> Result<SingleData> {
        self.feed(raw_bytes)?;
        self.finish()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.received = true;

        let mut rest = bytes;
        while let Some(pos) = rest.iter().position(|b| *b == NEWLINE_CHAR) {
            self.line.extend_from_slice(&rest[..pos]);
            let line = std::mem::take(&mut self.line);
            self.process_line(&line)?;
            self.line = line;
            self.line.clear();
            rest = &rest[pos + 1..];
        }
        self.line.extend_from_slice(rest);

        Ok(())
    }

    pub fn finish(mut self) -> Result<SingleData> {
        if !self.received {
            return Err(ArchiverError::EmptyResponse);
        }

        // The last line may come without a trailing newline
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.process_line(&line)?;
        }

        let pvname = self
            .pvname
            .filter(|name| !name.is_empty())
            .ok_or(ArchiverError::FailedToParse)?;
        let values = self.values.ok_or(ArchiverError::FailedToParse)?;

        debug!(pv = %pvname, samples = values.len(), "decoded PB response");
        Ok(SingleData::new(pvname, values))
    }

    fn process_line(&mut self, line: &[u8]) -> Result<()> {
        if line.is_empty() {
            self.state = ChunkState::Idle;
            return Ok(());
        }

        let unescaped = unescape_line(line);

        match self.state {
            ChunkState::Idle => self.process_header(&unescaped),
            ChunkState::InChunk { payload_type, year } => {
                self.process_record(&unescaped, payload_type, year)
            }
        }
    }

    fn process_header(&mut self, line: &[u8]) -> Result<()> {
        let info = PayloadInfo::decode(line).map_err(|e| {
            error!(error = %e, "failed to parse payload info");
            ArchiverError::FailedToParse
        })?;
        let payload_type =
            PayloadType::try_from(info.r#type).map_err(|_| ArchiverError::FailedToParse)?;

        if self.values.is_none() {
            self.values = Some(initial_values(
                payload_type,
                self.field,
                self.points_capacity,
            )?);
        }

        self.pvname = Some(info.pvname);
        self.state = ChunkState::InChunk {
            payload_type,
            year: info.year,
        };
        Ok(())
    }

    fn process_record(&mut self, line: &[u8], payload_type: PayloadType, year: i32) -> Result<()> {
        let values = self.values.as_mut().ok_or(ArchiverError::FailedToParse)?;

        match values {
            Values::Scalars(v) => {
                let (value, secs, nanos) = if self.field == FieldName::Val {
                    let r = numeric_record(line, payload_type)?;
                    let hidden = self.hide_invalid && r.severity == SEVERITY_INVALID;
                    ((!hidden).then_some(r.value), r.secs, r.nanos)
                } else {
                    let r = alarm_record(line, payload_type)?;
                    (Some(alarm_code(&r, self.field)? as f64), r.secs, r.nanos)
                };
                v.append(value, calc_time(year, secs, nanos)?);
            }
            Values::Arrays(v) => {
                let r = array_record(line, payload_type)?;
                v.append(r.value, calc_time(year, r.secs, r.nanos)?);
            }
            Values::Strings(v) => {
                let r = string_record(line)?;
                v.append(r.value, calc_time(year, r.secs, r.nanos)?);
            }
            Values::Enums(v) => {
                let r = alarm_record(line, payload_type)?;
                v.append(alarm_code(&r, self.field)?, calc_time(year, r.secs, r.nanos)?);
            }
        }

        Ok(())
    }
}

fn initial_values(payload_type: PayloadType, field: FieldName, capacity: usize) -> Result<Values> {
    let values = match field {
        FieldName::SevrAsEnum => Values::Enums(Enums::severity(capacity)),
        FieldName::StatAsEnum => Values::Enums(Enums::status(capacity)),
        FieldName::Sevr | FieldName::Stat => Values::Scalars(Scalars::with_capacity(capacity)),
        FieldName::Val => match payload_type {
            PayloadType::ScalarByte
            | PayloadType::ScalarShort
            | PayloadType::ScalarInt
            | PayloadType::ScalarEnum
            | PayloadType::ScalarFloat
            | PayloadType::ScalarDouble => Values::Scalars(Scalars::with_capacity(capacity)),
            PayloadType::ScalarString => Values::Strings(Strings::with_capacity(capacity)),
            PayloadType::WaveformByte
            | PayloadType::WaveformShort
            | PayloadType::WaveformInt
            | PayloadType::WaveformEnum
            | PayloadType::WaveformFloat
            | PayloadType::WaveformDouble => Values::Arrays(Arrays::with_capacity(capacity)),
            PayloadType::WaveformString | PayloadType::V4GenericBytes => {
                return Err(ArchiverError::IllegalPayloadType)
            }
        },
    };
    Ok(values)
}

fn alarm_code<T>(record: &Record<T>, field: FieldName) -> Result<i32> {
    match field {
        FieldName::Sevr | FieldName::SevrAsEnum => Ok(record.severity),
        FieldName::Stat | FieldName::StatAsEnum => Ok(record.status),
        FieldName::Val => Err(ArchiverError::IllegalFieldName("VAL".to_string())),
    }
}

fn decode_sample<M: Message + Default>(line: &[u8]) -> Result<M> {
    M::decode(line).map_err(|e| {
        error!(error = %e, "failed to parse payload data");
        ArchiverError::FailedToParse
    })
}

fn read_sample<M, T, F>(line: &[u8], value: F) -> Result<Record<T>>
where
    M: Message + Default + Sample,
    F: FnOnce(&M) -> T,
{
    let m = decode_sample::<M>(line)?;
    Ok(Record {
        value: value(&m),
        severity: m.severity_code(),
        status: m.status_code(),
        secs: m.seconds_into_year(),
        nanos: m.nanos(),
    })
}

fn read_numeric<M: Message + Default + NumericSample>(line: &[u8]) -> Result<Record<f64>> {
    read_sample::<M, _, _>(line, |m| m.val_as_f64())
}

fn read_array<M: Message + Default + ArraySample>(line: &[u8]) -> Result<Record<Vec<f64>>> {
    read_sample::<M, _, _>(line, |m| m.vals_as_f64())
}

fn read_alarm<M: Message + Default + Sample>(line: &[u8]) -> Result<Record<()>> {
    read_sample::<M, _, _>(line, |_| ())
}

fn numeric_record(line: &[u8], payload_type: PayloadType) -> Result<Record<f64>> {
    match payload_type {
        PayloadType::ScalarByte => read_numeric::<ScalarByte>(line),
        PayloadType::ScalarShort => read_numeric::<ScalarShort>(line),
        PayloadType::ScalarInt => read_numeric::<ScalarInt>(line),
        PayloadType::ScalarEnum => read_numeric::<ScalarEnum>(line),
        PayloadType::ScalarFloat => read_numeric::<ScalarFloat>(line),
        PayloadType::ScalarDouble => read_numeric::<ScalarDouble>(line),
        _ => Err(ArchiverError::IllegalPayloadType),
    }
}

fn array_record(line: &[u8], payload_type: PayloadType) -> Result<Record<Vec<f64>>> {
    match payload_type {
        PayloadType::WaveformByte => read_array::<VectorChar>(line),
        PayloadType::WaveformShort => read_array::<VectorShort>(line),
        PayloadType::WaveformInt => read_array::<VectorInt>(line),
        PayloadType::WaveformEnum => read_array::<VectorEnum>(line),
        PayloadType::WaveformFloat => read_array::<VectorFloat>(line),
        PayloadType::WaveformDouble => read_array::<VectorDouble>(line),
        _ => Err(ArchiverError::IllegalPayloadType),
    }
}

fn string_record(line: &[u8]) -> Result<Record<String>> {
    read_sample::<ScalarString, _, _>(line, |m| m.val.clone())
}

fn alarm_record(line: &[u8], payload_type: PayloadType) -> Result<Record<()>> {
    match payload_type {
        PayloadType::ScalarString => read_alarm::<ScalarString>(line),
        PayloadType::ScalarByte => read_alarm::<ScalarByte>(line),
        PayloadType::ScalarShort => read_alarm::<ScalarShort>(line),
        PayloadType::ScalarInt => read_alarm::<ScalarInt>(line),
        PayloadType::ScalarEnum => read_alarm::<ScalarEnum>(line),
        PayloadType::ScalarFloat => read_alarm::<ScalarFloat>(line),
        PayloadType::ScalarDouble => read_alarm::<ScalarDouble>(line),
        PayloadType::WaveformString => read_alarm::<VectorString>(line),
        PayloadType::WaveformByte => read_alarm::<VectorChar>(line),
        PayloadType::WaveformShort => read_alarm::<VectorShort>(line),
        PayloadType::WaveformInt => read_alarm::<VectorInt>(line),
        PayloadType::WaveformEnum => read_alarm::<VectorEnum>(line),
        PayloadType::WaveformFloat => read_alarm::<VectorFloat>(line),
        PayloadType::WaveformDouble => read_alarm::<VectorDouble>(line),
        PayloadType::V4GenericBytes => Err(ArchiverError::IllegalPayloadType),
    }
}

/// Decodes a `getData.qw` JSON body. Only the first PV of the response is used.
pub fn decode_json_response(bytes: &[u8]) -> Result<SingleData> {
    let responses: Vec<ArchiverResponse> = serde_json::from_slice(bytes)?;
    let response = responses
        .into_iter()
        .next()
        .ok_or(ArchiverError::EmptyResponse)?;

    let capacity = response.data.len();
    let values = if response.meta.waveform {
        let mut arrays = Arrays::with_capacity(capacity);
        for point in &response.data {
            let row = match &point.val {
                JsonValue::Array(items) => items
                    .iter()
                    .map(|item| item.as_f64().ok_or(ArchiverError::FailedToParse))
                    .collect::<Result<Vec<f64>>>()?,
                _ => return Err(ArchiverError::FailedToParse),
            };
            arrays.append(row, point.timestamp()?);
        }
        Values::Arrays(arrays)
    } else if response.data.iter().any(|p| p.val.is_string()) {
        let mut strings = Strings::with_capacity(capacity);
        for point in &response.data {
            let value = match &point.val {
                JsonValue::String(s) => s.clone(),
                JsonValue::Null => String::new(),
                other => other.to_string(),
            };
            strings.append(value, point.timestamp()?);
        }
        Values::Strings(strings)
    } else {
        let mut scalars = Scalars::with_capacity(capacity);
        for point in &response.data {
            let value = match &point.val {
                JsonValue::Null => None,
                JsonValue::Number(n) => n.as_f64(),
                _ => return Err(ArchiverError::FailedToParse),
            };
            scalars.append(value, point.timestamp()?);
        }
        Values::Scalars(scalars)
    };

    Ok(SingleData::new(response.meta.name, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn escape(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bytes.len());
        for &b in bytes {
            match b {
                ESCAPE_CHAR => out.extend_from_slice(&[ESCAPE_CHAR, ESCAPE_ESCAPE_CHAR]),
                NEWLINE_CHAR => out.extend_from_slice(&[ESCAPE_CHAR, NEWLINE_ESCAPE_CHAR]),
                CARRIAGERETURN_CHAR => {
                    out.extend_from_slice(&[ESCAPE_CHAR, CARRIAGERETURN_ESCAPE_CHAR])
                }
                b => out.push(b),
            }
        }
        out
    }

    fn header(payload_type: PayloadType, pvname: &str, year: i32) -> Vec<u8> {
        PayloadInfo {
            r#type: payload_type as i32,
            pvname: pvname.to_string(),
            year,
            element_count: None,
            headers: vec![],
        }
        .encode_to_vec()
    }

    fn double_sample(secs: u32, val: f64, severity: Option<i32>) -> Vec<u8> {
        ScalarDouble {
            secondsintoyear: secs,
            nano: 0,
            val,
            severity,
            status: Some(4),
        }
        .encode_to_vec()
    }

    fn stream(lines: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        for line in lines {
            out.extend(escape(line));
            out.push(NEWLINE_CHAR);
        }
        out
    }

    #[test]
    fn test_decode_doubles() {
        let body = stream(&[
            header(PayloadType::ScalarDouble, "PV:DOUBLE", 2021),
            double_sample(10, 1.5, None),
            double_sample(20, 10.0, None),
        ]);
        let sd = PbDecoder::new(FieldName::Val, false, 4)
            .decode_response(&body)
            .unwrap();

        assert_eq!(sd.name, "PV:DOUBLE");
        let s = sd.values.as_scalars().unwrap();
        assert_eq!(s.values, vec![Some(1.5), Some(10.0)]);
        assert_eq!(s.times[1], Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 20).unwrap());
    }

    #[test]
    fn test_escaped_bytes_survive() {
        // encodes to newline, escape and carriage return bytes
        let tricky = f64::from_le_bytes([0x0A, 0x1B, 0x0D, 0, 0, 0, 0xF0, 0x3F]);
        let body = stream(&[
            header(PayloadType::ScalarDouble, "PV:ESC", 2021),
            double_sample(0x0A, tricky, None),
        ]);
        let sd = PbDecoder::new(FieldName::Val, false, 1)
            .decode_response(&body)
            .unwrap();
        assert_eq!(sd.values.as_scalars().unwrap().values, vec![Some(tricky)]);
    }

    #[test]
    fn test_feed_in_small_pieces() {
        let body = stream(&[
            header(PayloadType::ScalarDouble, "PV:DOUBLE", 2021),
            double_sample(1, 1.0, None),
            double_sample(2, 2.0, None),
        ]);
        let mut decoder = PbDecoder::new(FieldName::Val, false, 2);
        for piece in body.chunks(3) {
            decoder.feed(piece).unwrap();
        }
        let sd = decoder.finish().unwrap();
        assert_eq!(
            sd.values.as_scalars().unwrap().values,
            vec![Some(1.0), Some(2.0)]
        );
    }

    #[test]
    fn test_hide_invalid() {
        let body = stream(&[
            header(PayloadType::ScalarDouble, "PV:DOUBLE", 2021),
            double_sample(1, 1.0, Some(3)),
            double_sample(2, 2.0, Some(2)),
        ]);
        let sd = PbDecoder::new(FieldName::Val, true, 2)
            .decode_response(&body)
            .unwrap();
        assert_eq!(sd.values.as_scalars().unwrap().values, vec![None, Some(2.0)]);
    }

    #[test]
    fn test_severity_field() {
        let body = stream(&[
            header(PayloadType::ScalarDouble, "PV:DOUBLE", 2021),
            double_sample(1, 1.0, Some(2)),
            double_sample(2, 2.0, None),
        ]);
        let sd = PbDecoder::new(FieldName::Sevr, false, 2)
            .decode_response(&body)
            .unwrap();
        assert_eq!(
            sd.values.as_scalars().unwrap().values,
            vec![Some(2.0), Some(0.0)]
        );
    }

    #[test]
    fn test_status_as_enum() {
        let body = stream(&[
            header(PayloadType::ScalarDouble, "PV:DOUBLE", 2021),
            double_sample(1, 1.0, None),
        ]);
        let sd = PbDecoder::new(FieldName::StatAsEnum, false, 1)
            .decode_response(&body)
            .unwrap();
        match sd.values {
            Values::Enums(e) => {
                assert_eq!(e.values, vec![4]);
                assert_eq!(e.legend.label(4), Some("HIGH"));
            }
            other => panic!("unexpected values: {:?}", other),
        }
    }

    #[test]
    fn test_empty_body() {
        let err = PbDecoder::new(FieldName::Val, false, 0)
            .decode_response(&[])
            .unwrap_err();
        assert!(err.is_empty_response());
    }

    #[test]
    fn test_malformed_header() {
        let body = vec![0xFF, 0xFF, 0xFF, NEWLINE_CHAR];
        let err = PbDecoder::new(FieldName::Val, false, 0)
            .decode_response(&body)
            .unwrap_err();
        assert!(matches!(err, ArchiverError::FailedToParse));
    }

    #[test]
    fn test_waveform_string_is_illegal() {
        let body = stream(&[header(PayloadType::WaveformString, "PV:WF", 2021)]);
        let err = PbDecoder::new(FieldName::Val, false, 0)
            .decode_response(&body)
            .unwrap_err();
        assert!(matches!(err, ArchiverError::IllegalPayloadType));
    }

    #[test]
    fn test_decode_json_scalars() {
        let body = br#"[{"meta": {"name": "PV:JSON", "PREC": "0"},
            "data": [{"millis": 1000, "val": 1.5}, {"millis": 2000, "val": null}]}]"#;
        let sd = decode_json_response(body).unwrap();
        assert_eq!(sd.name, "PV:JSON");
        assert_eq!(sd.values.as_scalars().unwrap().values, vec![Some(1.5), None]);
    }

    #[test]
    fn test_decode_json_waveform() {
        let body = br#"[{"meta": {"name": "PV:WF", "waveform": true},
            "data": [{"secs": 1, "nanos": 0, "val": [1, 2, 3]}]}]"#;
        let sd = decode_json_response(body).unwrap();
        assert_eq!(sd.values.as_arrays().unwrap().values, vec![vec![1.0, 2.0, 3.0]]);
    }

    #[test]
    fn test_decode_json_strings() {
        let body = br#"[{"meta": {"name": "PV:STR"},
            "data": [{"millis": 1000, "val": "on"}, {"millis": 2000, "val": "off"}]}]"#;
        let sd = decode_json_response(body).unwrap();
        match sd.values {
            Values::Strings(s) => assert_eq!(s.values, vec!["on", "off"]),
            other => panic!("unexpected values: {:?}", other),
        }
    }

    #[test]
    fn test_decode_json_empty() {
        let err = decode_json_response(b"[]").unwrap_err();
        assert!(err.is_empty_response());
    }
}
