//! CSV telemetry for controller tuning runs.
//!
//! One row per emitted frame: input, pose and controller readings. The column
//! list and the row format come from a single `define_telemetry!` schema.

use std::io::{self, Write};

use glam::DVec3;

use crate::{controller::ControllerTelemetry, geo::ecef_to_geodetic};

/// Snapshot of controller state and the input that produced it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// Seconds since the run started.
    pub elapsed: f64,
    /// Frame delta fed to `update()`.
    pub dt: f64,
    /// Throttle or forward input in `[-1, 1]`.
    pub throttle: f64,
    /// Steering or strafe input in `[-1, 1]`.
    pub steer: f64,
    pub boost: bool,
    /// ECEF camera position.
    pub position: DVec3,
    pub controller: ControllerTelemetry,
}

/// Where CSV lines go.
pub trait TelemetryOutput {
    /// Start a new table with `header`.
    fn write_header(&mut self, header: &str) -> io::Result<()>;
    /// Append one row.
    fn write_row(&mut self, row: &str) -> io::Result<()>;
}

/// Writes lines to any [`Write`], e.g. a locked stdout or a file.
#[derive(Debug)]
pub struct CsvTelemetry<W> {
    writer: W,
}

impl<W: Write> CsvTelemetry<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Flush and give back the writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> TelemetryOutput for CsvTelemetry<W> {
    fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.writer, "{header}")
    }

    fn write_row(&mut self, row: &str) -> io::Result<()> {
        writeln!(self.writer, "{row}")
    }
}

/// Keeps the last table in memory.
#[derive(Default, Debug)]
pub struct MemoryTelemetryOutput {
    pub header: Option<String>,
    pub rows: Vec<String>,
}

impl TelemetryOutput for MemoryTelemetryOutput {
    fn write_header(&mut self, header: &str) -> io::Result<()> {
        self.header = Some(header.to_owned());
        self.rows.clear();
        Ok(())
    }

    fn write_row(&mut self, row: &str) -> io::Result<()> {
        self.rows.push(row.to_owned());
        Ok(())
    }
}

/// Expands a column schema into `CSV_HEADER`, `reset_telemetry_to()` and
/// `emit_telemetry_to()`.
macro_rules! define_telemetry {
    (
        columns: { $( $name:ident : $fmt:literal ),* $(,)? },
        prelude: |$snapshot:ident| { $( $prelude:stmt );* $(;)? },
        row_values: { $( $val:expr ),* $(,)? }
    ) => {
        /// Column names, comma separated.
        pub const CSV_HEADER: &str = concat!( $( stringify!($name), "," ),* );

        /// Start a table on `output`.
        pub fn reset_telemetry_to(output: &mut dyn TelemetryOutput) -> io::Result<()> {
            output.write_header(CSV_HEADER.trim_end_matches(','))
        }

        /// Append `snapshot` as one row.
        pub fn emit_telemetry_to(
            $snapshot: &TelemetrySnapshot,
            output: &mut dyn TelemetryOutput,
        ) -> io::Result<()> {
            $( $prelude )*

            let line = format!( concat!( $( $fmt, "," ),* ), $( $val ),* );
            output.write_row(line.trim_end_matches(','))
        }
    };
}

define_telemetry! {
    columns: {
        t: "{:.4}",
        dt: "{:.5}",
        throttle: "{:.3}",
        steer: "{:.3}",
        boost: "{}",
        grounded: "{}",
        lon_deg: "{:.7}",
        lat_deg: "{:.7}",
        altitude: "{:.3}",
        speed: "{:.3}",
        heading_deg: "{:.2}",
        steer_deg: "{:.2}",
        vel_x: "{:.3}",
        vel_y: "{:.3}",
        vel_z: "{:.3}",
    },
    prelude: |s| {
        let geodetic = ecef_to_geodetic(s.position);
        let (lon, lat) = geodetic.lon_lat_degrees();
        let altitude = if s.controller.altitude.is_finite() { s.controller.altitude } else { -1.0 };
    },
    row_values: {
        s.elapsed,
        s.dt,
        s.throttle,
        s.steer,
        u8::from(s.boost),
        u8::from(s.controller.grounded),
        lon,
        lat,
        altitude,
        s.controller.speed,
        s.controller.heading.to_degrees(),
        s.controller.steer_angle.to_degrees(),
        s.controller.velocity.x,
        s.controller.velocity.y,
        s.controller.velocity.z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_matches_row_width() {
        let mut output = MemoryTelemetryOutput::default();
        reset_telemetry_to(&mut output).unwrap();
        emit_telemetry_to(&TelemetrySnapshot::default(), &mut output).unwrap();

        let header = output.header.as_deref().unwrap();
        assert!(header.starts_with("t,dt,throttle"));
        assert!(!header.ends_with(','));
        assert_eq!(output.rows.len(), 1);
        assert_eq!(
            header.split(',').count(),
            output.rows[0].split(',').count()
        );
    }

    #[test]
    fn test_row_formats_values() {
        let mut output = MemoryTelemetryOutput::default();
        let snapshot = TelemetrySnapshot {
            elapsed: 1.5,
            boost: true,
            position: crate::geo::geodetic_to_ecef(crate::geo::Geodetic::from_degrees(
                10.0, 20.0, 5.0,
            )),
            controller: ControllerTelemetry {
                speed: 12.25,
                grounded: true,
                altitude: 5.0,
                ..ControllerTelemetry::default()
            },
            ..TelemetrySnapshot::default()
        };
        emit_telemetry_to(&snapshot, &mut output).unwrap();

        let columns: Vec<&str> = output.rows[0].split(',').collect();
        assert_eq!(columns[0], "1.5000");
        assert_eq!(columns[4], "1");
        assert_eq!(columns[5], "1");
        assert_eq!(columns[6], "10.0000000");
        assert_eq!(columns[7], "20.0000000");
        assert_eq!(columns[8], "5.000");
        assert_eq!(columns[9], "12.250");
    }

    #[test]
    fn test_csv_writer_emits_lines() {
        let mut output = CsvTelemetry::new(Vec::new());
        reset_telemetry_to(&mut output).unwrap();
        emit_telemetry_to(&TelemetrySnapshot::default(), &mut output).unwrap();
        emit_telemetry_to(&TelemetrySnapshot::default(), &mut output).unwrap();

        let bytes = output.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER.trim_end_matches(','));
        assert_eq!(lines[1], lines[2]);
        assert!(text.ends_with('\n'));
    }
}
