// src/gps/nmea.rs
//! GGA sentence tokenizing and parsing

use super::data::GgaFix;

/// Sentence prefixes accepted by the bridge.
pub const GGA_PREFIXES: [&str; 2] = ["$GNGGA", "$GPGGA"];

/// Why a line was not turned into a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GgaRejection {
    /// The receiver has no position solution yet. Expected during cold
    /// start; the caller reports it as status and keeps reading.
    NoFix,
    /// Structurally broken sentence: too few fields, checksum mismatch, or a
    /// non-numeric value where a number is required. One coarse class; the
    /// field layout carries no finer diagnostic.
    Malformed,
}

/// The GGA fields this bridge consumes, picked out of the comma-split body
/// by name instead of bare indices.
///
/// Layout: `$--GGA,hhmmss.sss,ddmm.mmmm,a,dddmm.mmmm,a,x,xx,x.x,x.x,M,...`
#[derive(Debug)]
struct GgaFields<'a> {
    lat_raw: &'a str,
    lat_hemisphere: &'a str,
    lon_raw: &'a str,
    lon_hemisphere: &'a str,
    quality: &'a str,
    satellites: &'a str,
    altitude: &'a str,
}

/// Check whether a line is one of the accepted GGA sentence types
pub fn is_gga_sentence(line: &str) -> bool {
    GGA_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
}

/// Parse a GGA sentence into a fix record.
///
/// The caller is expected to have stripped the trailing newline already.
/// Returns `GgaRejection::NoFix` while the receiver has no solution and
/// `GgaRejection::Malformed` for anything structurally broken; neither is a
/// process-level error.
pub fn parse_gga(line: &str) -> Result<GgaFix, GgaRejection> {
    let body = verify_checksum(line)?;
    let fields = tokenize(body)?;

    if fields.lat_raw.is_empty() || fields.lon_raw.is_empty() || fields.quality == "0" {
        return Err(GgaRejection::NoFix);
    }

    let latitude = to_decimal_degrees(fields.lat_raw, fields.lat_hemisphere, 2)?;
    let longitude = to_decimal_degrees(fields.lon_raw, fields.lon_hemisphere, 3)?;

    // An empty altitude field is common on cheap receivers and does not
    // invalidate the fix
    let altitude = if fields.altitude.is_empty() {
        0.0
    } else {
        fields.altitude.parse::<f64>().map_err(|_| GgaRejection::Malformed)?
    };

    let satellites = fields
        .satellites
        .parse::<u32>()
        .map_err(|_| GgaRejection::Malformed)?;
    let quality = fields
        .quality
        .parse::<u8>()
        .map_err(|_| GgaRejection::Malformed)?;

    Ok(GgaFix {
        latitude,
        longitude,
        altitude,
        satellites,
        quality,
    })
}

/// Validate a trailing `*HH` checksum if the sentence carries one.
///
/// Returns the sentence body with the checksum suffix removed. Sentences
/// without a checksum pass through unchanged; a present but mismatched
/// checksum rejects the line.
fn verify_checksum(line: &str) -> Result<&str, GgaRejection> {
    let (body, suffix) = match line.split_once('*') {
        Some((body, suffix)) => (body, suffix),
        None => return Ok(line),
    };

    let suffix = suffix.trim();
    if suffix.len() != 2 || !suffix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Ok(body);
    }

    let expected = u8::from_str_radix(suffix, 16).map_err(|_| GgaRejection::Malformed)?;
    let payload = body.strip_prefix('$').unwrap_or(body);
    let computed = payload.bytes().fold(0u8, |sum, b| sum ^ b);

    if computed == expected {
        Ok(body)
    } else {
        Err(GgaRejection::Malformed)
    }
}

/// Split the sentence body into named fields.
fn tokenize(body: &str) -> Result<GgaFields<'_>, GgaRejection> {
    let parts: Vec<&str> = body.split(',').collect();

    // Minimum field count to reach the altitude field
    if parts.len() < 11 {
        return Err(GgaRejection::Malformed);
    }

    Ok(GgaFields {
        lat_raw: parts[2],
        lat_hemisphere: parts[3],
        lon_raw: parts[4],
        lon_hemisphere: parts[5],
        quality: parts[6],
        satellites: parts[7],
        altitude: parts[9],
    })
}

/// Convert a `DDMM.MMMM` / `DDDMM.MMMM` coordinate to signed decimal degrees.
///
/// `deg_len` is 2 for latitude and 3 for longitude. Southern and western
/// hemispheres negate the value.
fn to_decimal_degrees(raw: &str, hemisphere: &str, deg_len: usize) -> Result<f64, GgaRejection> {
    let degrees_part = raw.get(..deg_len).ok_or(GgaRejection::Malformed)?;
    let minutes_part = raw.get(deg_len..).ok_or(GgaRejection::Malformed)?;

    let degrees = degrees_part
        .parse::<u32>()
        .map_err(|_| GgaRejection::Malformed)?;
    let minutes = minutes_part
        .parse::<f64>()
        .map_err(|_| GgaRejection::Malformed)?;

    let mut value = degrees as f64 + minutes / 60.0;
    if hemisphere == "S" || hemisphere == "W" {
        value = -value;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "$GNGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,,,,";

    #[test]
    fn test_reference_sentence() {
        let fix = parse_gga(REFERENCE).unwrap();

        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((fix.longitude - 11.5167).abs() < 1e-4);
        assert_eq!(fix.altitude, 545.4);
        assert_eq!(fix.satellites, 8);
        assert_eq!(fix.quality, 1);
    }

    #[test]
    fn test_latitude_conversion() {
        // 4807.038 N -> 48 + 7.038/60
        let fix = parse_gga(REFERENCE).unwrap();
        assert!((fix.latitude - (48.0 + 7.038 / 60.0)).abs() < 1e-9);
    }

    #[test]
    fn test_longitude_uses_three_degree_digits() {
        // 01131.000 E -> 11 + 31.000/60, not 113 + 1.000/60
        let fix = parse_gga(REFERENCE).unwrap();
        assert!((fix.longitude - (11.0 + 31.0 / 60.0)).abs() < 1e-9);
    }

    #[test]
    fn test_southern_western_hemispheres_negate() {
        let north_east = parse_gga(REFERENCE).unwrap();
        let south_west =
            parse_gga("$GNGGA,123519,4807.038,S,01131.000,W,1,08,0.9,545.4,M,,,,").unwrap();

        assert_eq!(south_west.latitude, -north_east.latitude);
        assert_eq!(south_west.longitude, -north_east.longitude);
    }

    #[test]
    fn test_no_fix_when_quality_zero() {
        let result = parse_gga("$GNGGA,123519,4807.038,N,01131.000,E,0,00,,,M,,,,");
        assert_eq!(result, Err(GgaRejection::NoFix));
    }

    #[test]
    fn test_no_fix_when_coordinates_empty() {
        let result = parse_gga("$GNGGA,123519,,,,,,,,,,,,");
        assert_eq!(result, Err(GgaRejection::NoFix));
    }

    #[test]
    fn test_malformed_when_too_few_fields() {
        assert_eq!(parse_gga("$GNGGA,123519,4807.038"), Err(GgaRejection::Malformed));
        assert_eq!(parse_gga(""), Err(GgaRejection::Malformed));
        assert_eq!(parse_gga("garbage"), Err(GgaRejection::Malformed));
    }

    #[test]
    fn test_empty_altitude_defaults_to_zero() {
        let fix = parse_gga("$GNGGA,123519,4807.038,N,01131.000,E,1,08,0.9,,M,,,,").unwrap();
        assert_eq!(fix.altitude, 0.0);
        assert_eq!(fix.quality, 1);
    }

    #[test]
    fn test_garbage_altitude_is_malformed() {
        let result = parse_gga("$GNGGA,123519,4807.038,N,01131.000,E,1,08,0.9,xyz,M,,,,");
        assert_eq!(result, Err(GgaRejection::Malformed));
    }

    #[test]
    fn test_garbage_coordinate_is_malformed() {
        let result = parse_gga("$GNGGA,123519,48xx.038,N,01131.000,E,1,08,0.9,545.4,M,,,,");
        assert_eq!(result, Err(GgaRejection::Malformed));
    }

    #[test]
    fn test_truncated_coordinate_is_malformed() {
        // Shorter than the degrees prefix
        let result = parse_gga("$GNGGA,123519,4,N,01131.000,E,1,08,0.9,545.4,M,,,,");
        assert_eq!(result, Err(GgaRejection::Malformed));
    }

    #[test]
    fn test_valid_checksum_accepted() {
        let fix = parse_gga("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47")
            .unwrap();
        assert_eq!(fix.satellites, 8);
        assert_eq!(fix.altitude, 545.4);
    }

    #[test]
    fn test_invalid_checksum_rejected() {
        let result =
            parse_gga("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*00");
        assert_eq!(result, Err(GgaRejection::Malformed));
    }

    #[test]
    fn test_prefix_filter() {
        assert!(is_gga_sentence("$GNGGA,123519,,,,,,,,,,,,"));
        assert!(is_gga_sentence(REFERENCE.replace("$GNGGA", "$GPGGA").as_str()));
        assert!(!is_gga_sentence("$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,,"));
        assert!(!is_gga_sentence(""));
    }
}
