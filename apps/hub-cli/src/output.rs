//! Terminal rendering of upload events, reports and fleet status.

use std::process::ExitCode;

use printlink_fleet_status::{DeviceStatusSnapshot, FleetSummary};
use printlink_hub_control::{CommandOutcome, CommandReport, UploadEvent, UploadOutcome, UploadReport};

pub const UNCONFIRMED_HINT: &str = "no confirmation received, verify on the printer";

/// Exit status when the device never answered.
const EXIT_UNCONFIRMED: u8 = 2;

/// One progress line per upload event.
pub fn event_line(event: &UploadEvent) -> String {
    match event {
        UploadEvent::Started {
            filename,
            device_id,
            total_size,
            chunks,
            ..
        } => format!("uploading {filename} to {device_id}: {total_size} bytes in {chunks} chunks"),
        UploadEvent::Progress {
            sent_bytes,
            total_size,
            percent,
            ..
        } => format!("{percent:>3}% {sent_bytes}/{total_size} bytes"),
        UploadEvent::StateChanged { state, .. } => format!("     {state}"),
        UploadEvent::ControllerProgress {
            received_bytes,
            percent,
            ..
        } => match (percent, received_bytes) {
            (Some(p), _) => format!("     controller {p:.0}%"),
            (None, Some(b)) => format!("     controller received {b} bytes"),
            (None, None) => "     controller working".to_string(),
        },
    }
}

pub fn upload_summary(report: &UploadReport) -> (String, ExitCode) {
    match &report.outcome {
        UploadOutcome::Succeeded { target, .. } => {
            let at = target.as_deref().unwrap_or(&report.filename);
            (
                format!("uploaded {} to {} ({at})", report.filename, report.device_id),
                ExitCode::SUCCESS,
            )
        }
        UploadOutcome::Rejected { error } => {
            (format!("upload rejected: {error}"), ExitCode::FAILURE)
        }
        UploadOutcome::Unconfirmed => (
            UNCONFIRMED_HINT.to_string(),
            ExitCode::from(EXIT_UNCONFIRMED),
        ),
    }
}

pub fn command_summary(report: &CommandReport) -> (String, ExitCode) {
    let name = report.command.name();
    match &report.outcome {
        CommandOutcome::Succeeded => (
            format!("{name} accepted by {}", report.device_id),
            ExitCode::SUCCESS,
        ),
        CommandOutcome::Rejected { error } => (format!("{name} rejected: {error}"), ExitCode::FAILURE),
        CommandOutcome::Unconfirmed => (
            UNCONFIRMED_HINT.to_string(),
            ExitCode::from(EXIT_UNCONFIRMED),
        ),
    }
}

pub fn snapshot_line(s: &DeviceStatusSnapshot) -> String {
    let link = if s.connected { "online" } else { "offline" };
    let activity = if s.printing { "printing" } else { "idle" };
    format!(
        "{:<20} {link:<8} {activity:<9} {}",
        s.device_id,
        s.last_updated_at.format("%Y-%m-%d %H:%M:%S")
    )
}

pub fn summary_line(summary: &FleetSummary) -> String {
    format!(
        "{} printers, {} connected, {} printing",
        summary.total, summary.connected, summary.printing
    )
}
