use crate::{
    error::{GribError, TemplateKind},
    utils::{is_missing, read_as, GribInt},
};

/// A fixed surface reference: type, scale factor and scaled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedSurface {
    pub surface_type: u8,
    pub scale_factor: i8,
    pub scaled_value: u32,
}

impl FixedSurface {
    fn from_buf(buf: &[u8]) -> Self {
        Self {
            surface_type: buf[0],
            scale_factor: buf[1].as_grib_int(),
            scaled_value: read_as!(u32, buf, 2),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.surface_type == u8::MAX || is_missing(u64::from(self.scaled_value), 32)
    }

    /// The surface value with the decimal scale factor applied.
    pub fn value(&self) -> f64 {
        f64::from(self.scaled_value) / 10_f64.powi(i32::from(self.scale_factor))
    }
}

/// Product Definition Template 4.0: analysis or forecast at a horizontal
/// level or layer at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnalysisForecastProduct {
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub generating_process: u8,
    pub background_process: u8,
    pub generating_process_id: u8,
    pub hours_after_cutoff: u16,
    pub minutes_after_cutoff: u8,
    pub time_unit: u8,
    pub forecast_time: i32,
    pub first_surface: FixedSurface,
    pub second_surface: FixedSurface,
}

const ANALYSIS_FORECAST_SIZE: usize = 25;

impl AnalysisForecastProduct {
    pub(crate) fn from_buf(buf: &[u8]) -> Self {
        Self {
            parameter_category: buf[0],
            parameter_number: buf[1],
            generating_process: buf[2],
            background_process: buf[3],
            generating_process_id: buf[4],
            hours_after_cutoff: read_as!(u16, buf, 5),
            minutes_after_cutoff: buf[7],
            time_unit: buf[8],
            forecast_time: read_as!(u32, buf, 9).as_grib_int(),
            first_surface: FixedSurface::from_buf(&buf[13..19]),
            second_surface: FixedSurface::from_buf(&buf[19..25]),
        }
    }
}

/// End of the overall time interval of template 4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalEnd {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// One 12-octet time range specification of template 4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRangeSpec {
    pub statistical_process: u8,
    pub time_increment_type: u8,
    pub range_time_unit: u8,
    pub range_length: u32,
    pub increment_time_unit: u8,
    pub increment: u32,
}

const TIME_RANGE_SPEC_SIZE: usize = 12;

impl TimeRangeSpec {
    fn from_buf(buf: &[u8]) -> Self {
        Self {
            statistical_process: buf[0],
            time_increment_type: buf[1],
            range_time_unit: buf[2],
            range_length: read_as!(u32, buf, 3),
            increment_time_unit: buf[7],
            increment: read_as!(u32, buf, 8),
        }
    }
}

/// Product Definition Template 4.8: average, accumulation or extreme over a
/// time interval. Extends template 4.0 with statistical-processing fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatisticalProduct {
    pub point_in_time: AnalysisForecastProduct,
    pub interval_end: IntervalEnd,
    pub num_time_ranges: u8,
    pub num_missing_values: u32,
    pub first_range: TimeRangeSpec,
    /// The (n - 1) further 12-octet range specifications, retained verbatim.
    pub extra_ranges: Box<[u8]>,
}

const STATISTICAL_FIXED_SIZE: usize = ANALYSIS_FORECAST_SIZE + 12 + TIME_RANGE_SPEC_SIZE;

impl StatisticalProduct {
    pub(crate) fn from_buf(buf: &[u8]) -> Self {
        let point_in_time = AnalysisForecastProduct::from_buf(buf);
        let buf = &buf[ANALYSIS_FORECAST_SIZE..];
        Self {
            point_in_time,
            interval_end: IntervalEnd {
                year: read_as!(u16, buf, 0),
                month: buf[2],
                day: buf[3],
                hour: buf[4],
                minute: buf[5],
                second: buf[6],
            },
            num_time_ranges: buf[7],
            num_missing_values: read_as!(u32, buf, 8),
            first_range: TimeRangeSpec::from_buf(&buf[12..24]),
            extra_ranges: buf[24..].into(),
        }
    }

    /// All range specifications, including the decoded first one.
    pub fn time_ranges(&self) -> Vec<TimeRangeSpec> {
        let mut ranges = vec![self.first_range];
        ranges.extend(
            self.extra_ranges
                .chunks_exact(TIME_RANGE_SPEC_SIZE)
                .map(TimeRangeSpec::from_buf),
        );
        ranges
    }
}

/// Decoded Product Definition Template payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductTemplate {
    AnalysisForecast(AnalysisForecastProduct),
    Statistical(StatisticalProduct),
    Missing,
}

impl ProductTemplate {
    pub(crate) fn from_template(number: u16, buf: &[u8]) -> Result<Self, GribError> {
        match number {
            0 if buf.len() < ANALYSIS_FORECAST_SIZE => Err(short_payload(number, buf.len())),
            0 => Ok(Self::AnalysisForecast(AnalysisForecastProduct::from_buf(
                buf,
            ))),
            8 if buf.len() < STATISTICAL_FIXED_SIZE => Err(short_payload(number, buf.len())),
            8 => Ok(Self::Statistical(StatisticalProduct::from_buf(buf))),
            255 => Ok(Self::Missing),
            _ => Err(GribError::UnsupportedTemplate(TemplateKind::Product, number)),
        }
    }
}

fn short_payload(number: u16, len: usize) -> GribError {
    GribError::Malformed(format!(
        "product definition template {number} payload too short: {len} octets"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis_forecast_buf() -> Vec<u8> {
        let mut buf = vec![0; ANALYSIS_FORECAST_SIZE];
        buf[0] = 0; // temperature
        buf[1] = 0;
        buf[2] = 2; // forecast
        buf[4] = 96;
        buf[8] = 1; // hours
        buf[9..13].copy_from_slice(&6_u32.to_be_bytes());
        buf[13] = 103; // height above ground
        buf[14] = 0;
        buf[15..19].copy_from_slice(&2_u32.to_be_bytes());
        buf[19] = 255;
        buf[20] = 255;
        buf[21..25].copy_from_slice(&u32::MAX.to_be_bytes());
        buf
    }

    #[test]
    fn decode_analysis_forecast() {
        let tmpl = ProductTemplate::from_template(0, &analysis_forecast_buf()).unwrap();
        let ProductTemplate::AnalysisForecast(def) = tmpl else {
            panic!("expected template 4.0");
        };
        assert_eq!(def.parameter_category, 0);
        assert_eq!(def.time_unit, 1);
        assert_eq!(def.forecast_time, 6);
        assert_eq!(def.first_surface.surface_type, 103);
        assert_eq!(def.first_surface.value(), 2.0);
        assert!(!def.first_surface.is_missing());
        assert!(def.second_surface.is_missing());
    }

    #[test]
    fn decode_statistical_with_two_ranges() {
        let mut buf = analysis_forecast_buf();
        buf.extend_from_slice(&2021_u16.to_be_bytes());
        buf.extend_from_slice(&[11, 20, 18, 0, 0]);
        buf.push(2); // two time ranges
        buf.extend_from_slice(&0_u32.to_be_bytes());
        // first range: accumulation over 6 hours
        buf.extend_from_slice(&[1, 2, 1]);
        buf.extend_from_slice(&6_u32.to_be_bytes());
        buf.push(255);
        buf.extend_from_slice(&0_u32.to_be_bytes());
        // second range, kept opaque
        buf.extend_from_slice(&[0, 1, 1]);
        buf.extend_from_slice(&3_u32.to_be_bytes());
        buf.push(1);
        buf.extend_from_slice(&1_u32.to_be_bytes());

        let tmpl = ProductTemplate::from_template(8, &buf).unwrap();
        let ProductTemplate::Statistical(def) = tmpl else {
            panic!("expected template 4.8");
        };
        assert_eq!(def.interval_end.year, 2021);
        assert_eq!(def.num_time_ranges, 2);
        assert_eq!(def.first_range.statistical_process, 1);
        assert_eq!(def.first_range.range_length, 6);
        assert_eq!(def.extra_ranges.len(), TIME_RANGE_SPEC_SIZE);

        let ranges = def.time_ranges();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].range_length, 3);
        assert_eq!(ranges[1].increment, 1);
    }

    #[test]
    fn unknown_template_number() {
        assert_eq!(
            ProductTemplate::from_template(11, &[0; 64]),
            Err(GribError::UnsupportedTemplate(TemplateKind::Product, 11))
        );
    }
}
