// src/gps/data.rs
//! Parsed GGA fix record

/// A validated position fix extracted from one GGA sentence.
///
/// Only produced when the sentence carried non-empty coordinate fields and a
/// fix quality other than 0. Created, forwarded and dropped within one loop
/// iteration; never retained.
#[derive(Debug, Clone, PartialEq)]
pub struct GgaFix {
    pub latitude: f64,   // signed decimal degrees
    pub longitude: f64,  // signed decimal degrees
    pub altitude: f64,   // meters, 0.0 when the source field was empty
    pub satellites: u32,
    pub quality: u8,
}

impl GgaFix {
    /// Format the fix as a single semicolon-delimited record line.
    ///
    /// Wire format: `lat;lon;alt;quality-FIX\n` with fixed decimal precision.
    pub fn to_record(&self) -> String {
        format!(
            "{:.6};{:.6};{:.1};{}-FIX\n",
            self.latitude, self.longitude, self.altitude, self.quality
        )
    }

    /// Get fix quality description
    pub fn quality_description(&self) -> String {
        match self.quality {
            0 => "No fix".to_string(),
            1 => "GPS".to_string(),
            2 => "DGPS".to_string(),
            3 => "PPS".to_string(),
            4 => "RTK Fixed".to_string(),
            5 => "RTK Float".to_string(),
            6 => "Estimated".to_string(),
            _ => format!("Unknown ({})", self.quality),
        }
    }
}
