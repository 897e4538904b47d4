//! Host telemetry sampling.

// std
use std::{
	path::Path,
	sync::{Mutex, PoisonError},
};
// crates.io
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, Networks, System};
// self
use crate::_prelude::*;

/// One host telemetry reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HostSample {
	/// CPU utilisation in percent, instantaneous since the previous sample.
	pub cpu_percent: f64,
	/// Memory utilisation in percent.
	pub memory_percent: f64,
	/// Disk utilisation in percent for the root filesystem.
	pub disk_percent: f64,
	/// One-minute load average; zero on platforms without load averages.
	pub load_1: f64,
	/// Five-minute load average.
	pub load_5: f64,
	/// Fifteen-minute load average.
	pub load_15: f64,
	/// NIC bytes sent since boot, summed over interfaces.
	pub net_bytes_sent: u64,
	/// NIC bytes received since boot, summed over interfaces.
	pub net_bytes_recv: u64,
}

/// Provider of host metrics.
pub trait HostTelemetry: Send + Sync {
	/// Sample the host synchronously.
	fn sample(&self) -> Result<HostSample>;
}

/// `sysinfo`-backed telemetry provider.
///
/// Keeps a persistent [`System`] so CPU readings are deltas since the previous
/// call rather than blocking measurements.
#[derive(Debug)]
pub struct SysinfoTelemetry {
	system: Mutex<System>,
}
impl SysinfoTelemetry {
	/// Create a provider, priming the CPU baseline so the first sample is
	/// meaningful.
	pub fn new() -> Self {
		let mut system = System::new();

		system.refresh_cpu_usage();
		system.refresh_memory();

		Self { system: Mutex::new(system) }
	}
}
impl Default for SysinfoTelemetry {
	fn default() -> Self {
		Self::new()
	}
}
impl HostTelemetry for SysinfoTelemetry {
	fn sample(&self) -> Result<HostSample> {
		let (cpu_percent, memory_percent) = {
			let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);

			system.refresh_cpu_usage();
			system.refresh_memory();

			let cpu = f64::from(system.global_cpu_info().cpu_usage());
			let memory = match system.total_memory() {
				0 => 0.,
				total => system.used_memory() as f64 / total as f64 * 100.,
			};

			(cpu, memory)
		};
		let disk_percent = root_disk_percent(&Disks::new_with_refreshed_list());
		let load = System::load_average();
		let (net_bytes_sent, net_bytes_recv) = Networks::new_with_refreshed_list().iter().fold(
			(0, 0),
			|(sent, recv), (_, data)| {
				(sent + data.total_transmitted(), recv + data.total_received())
			},
		);

		Ok(HostSample {
			cpu_percent,
			memory_percent,
			disk_percent,
			load_1: load.one,
			load_5: load.five,
			load_15: load.fifteen,
			net_bytes_sent,
			net_bytes_recv,
		})
	}
}

fn root_disk_percent(disks: &Disks) -> f64 {
	let disk = disks
		.list()
		.iter()
		.find(|disk| disk.mount_point() == Path::new("/"))
		.or_else(|| disks.list().iter().max_by_key(|disk| disk.total_space()));
	let Some(disk) = disk else {
		return 0.;
	};

	match disk.total_space() {
		0 => 0.,
		total => (total - disk.available_space()) as f64 / total as f64 * 100.,
	}
}
