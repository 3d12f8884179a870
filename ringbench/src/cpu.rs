//! CPU pinning for benchmark workers.

use crate::error::{ BenchError, Result };

/// Number of logical CPUs visible to this process
pub fn available_cores() -> usize {
    num_cpus::get()
}

/// Reject core ids the machine does not have.
pub fn validate_cores(cores: &[usize]) -> Result<()> {
    let available = available_cores();
    match cores.iter().find(|&&core| core >= available) {
        Some(core) => Err(crate::config_error!("core {} out of range, {} cores available", core, available)),
        None => Ok(()),
    }
}

/// Core for worker `idx`, wrapping around the list. `None` leaves the worker unpinned.
pub fn core_for_worker(cores: &[usize], idx: usize) -> Option<usize> {
    if cores.is_empty() {
        None
    } else {
        Some(cores[idx % cores.len()])
    }
}

#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu_id: usize) -> Result<()> {
    use nix::sched::{ sched_setaffinity, CpuSet };
    use nix::unistd::Pid;

    let mut cpu_set = CpuSet::new();
    cpu_set
        .set(cpu_id)
        .map_err(|e| BenchError::cpu_affinity(format!("core {cpu_id}: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpu_set)
        .map_err(|e| BenchError::cpu_affinity(format!("core {cpu_id}: {e}")))
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu_id: usize) -> Result<()> {
    Ok(())
}

/// Pin the calling worker if a core is configured. Failures are logged, not fatal.
pub fn pin_worker(role: &'static str, idx: usize, cores: &[usize]) {
    if let Some(core) = core_for_worker(cores, idx) {
        if let Err(err) = pin_to_cpu(core) {
            tracing::warn!(role, idx, core, %err, "failed to pin worker, running unpinned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_for_worker_wraps() {
        assert_eq!(core_for_worker(&[], 3), None);
        assert_eq!(core_for_worker(&[2, 5], 0), Some(2));
        assert_eq!(core_for_worker(&[2, 5], 3), Some(5));
    }

    #[test]
    fn test_validate_cores() {
        assert!(validate_cores(&[0]).is_ok());
        assert!(validate_cores(&[]).is_ok());
        assert!(validate_cores(&[available_cores()]).is_err());
    }
}
