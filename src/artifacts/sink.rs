//! Artifact sink trait and the filesystem implementation.

use std::path::Path;

use image::RgbImage;
use tracing::{info, warn};

use super::{AlertLog, CropWriter};
use crate::dispatcher::{ArtifactKind, ArtifactRequest};
use crate::Result;

/// Consumer of artifact requests.
///
/// Called once per request, in the order the dispatcher produced them.
pub trait ArtifactSink {
    /// Perform the side effect for one request.
    ///
    /// # Arguments
    /// * `request` - The artifact to persist
    /// * `frame` - Decoded source frame, if the orchestrator has one
    fn consume(&mut self, request: &ArtifactRequest, frame: Option<&RgbImage>) -> Result<()>;

    /// Flush buffered output.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes person crops, vehicle crops and the alert log to disk.
pub struct FsArtifactSink {
    persons: CropWriter,
    vehicles: CropWriter,
    alerts: AlertLog,
}

impl FsArtifactSink {
    /// Create the sink; directories are created and the alert log is reset.
    pub fn new<P1, P2, P3>(person_dir: P1, vehicle_dir: P2, alert_log: P3) -> Result<Self>
    where
        P1: AsRef<Path>,
        P2: AsRef<Path>,
        P3: AsRef<Path>,
    {
        Ok(Self {
            persons: CropWriter::new(person_dir)?,
            vehicles: CropWriter::new(vehicle_dir)?,
            alerts: AlertLog::create(alert_log)?,
        })
    }

    /// Standard layout under one output directory:
    /// `persons/`, `vehicles/` and `alerts.log`.
    pub fn in_dir<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let dir = output_dir.as_ref();
        Self::new(dir.join("persons"), dir.join("vehicles"), dir.join("alerts.log"))
    }

    pub fn alert_log(&self) -> &AlertLog {
        &self.alerts
    }

    /// Crops written as `(persons, vehicles)`.
    pub fn crops_written(&self) -> (usize, usize) {
        (self.persons.written(), self.vehicles.written())
    }
}

impl ArtifactSink for FsArtifactSink {
    fn consume(&mut self, request: &ArtifactRequest, frame: Option<&RgbImage>) -> Result<()> {
        let writer = match request.kind {
            ArtifactKind::PersonViolation => &mut self.persons,
            ArtifactKind::VehicleSighting => &mut self.vehicles,
        };

        let crop_path = match frame {
            Some(frame) => writer.write(request, frame)?,
            None => {
                warn!(
                    frame = request.frame_index,
                    kind = %request.kind,
                    identity = request.identity,
                    "no frame available, crop skipped"
                );
                None
            }
        };

        if let Some(path) = &crop_path {
            if request.kind == ArtifactKind::VehicleSighting {
                info!(path = %path.display(), label = %request.label, "vehicle crop saved");
            }
        }

        if let Some(line) = request.alert_line(crop_path.as_deref()) {
            info!(identity = request.identity, "{}", line);
            self.alerts.append(&line)?;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.alerts.flush()
    }
}
