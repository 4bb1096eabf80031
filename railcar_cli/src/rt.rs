//! Real-time scheduling helpers (Linux SCHED_FIFO / affinity / mlockall; macOS mlockall).

use crate::cli::RtLock;

#[cfg(target_os = "linux")]
/// Capacity of cpu_set_t in CPU indices (bits).
const MAX_CPUSET_BITS: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, prio: Option<i32>, lock: RtLock, rt_cpu: Option<usize>) {
    use libc::{
        CPU_ISSET, CPU_SET, CPU_ZERO, MCL_CURRENT, MCL_FUTURE, SCHED_FIFO, mlockall,
        sched_get_priority_max, sched_get_priority_min, sched_param, sched_setscheduler,
    };
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }

    fn lock_flags(lock: RtLock) -> Option<libc::c_int> {
        match lock {
            RtLock::None => None,
            RtLock::Current => Some(MCL_CURRENT),
            RtLock::All => Some(MCL_CURRENT | MCL_FUTURE),
        }
    }

    // Apply process memory locking; on EPERM/ENOMEM, `all` falls back to `current`.
    fn try_apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
        let Some(flags) = lock_flags(lock) else {
            return Ok(());
        };
        if unsafe { mlockall(flags) } == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        let retryable =
            matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM);
        if matches!(lock, RtLock::All) && retryable && unsafe { mlockall(MCL_CURRENT) } == 0 {
            tracing::warn!(error = %err, "mlockall(all) refused; locked current pages only");
            return Ok(());
        }
        let mut msg = format!("mlockall failed: {err}");
        if retryable {
            msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
        }
        Err(eyre::eyre!(msg))
    }

    // Apply SCHED_FIFO priority, clamped to the system range.
    fn try_apply_fifo_priority(prio: Option<i32>) -> eyre::Result<()> {
        let (min, max) = unsafe {
            let min = sched_get_priority_min(SCHED_FIFO);
            let max = sched_get_priority_max(SCHED_FIFO);
            if min < 0 || max < 0 { (1, 99) } else { (min, max) }
        };
        let prio_val = prio.unwrap_or(max).clamp(min, max);
        let param = sched_param {
            sched_priority: prio_val,
        };
        if unsafe { sched_setscheduler(0, SCHED_FIFO, &param) } != 0 {
            let err = std::io::Error::last_os_error();
            return Err(eyre::eyre!(
                "sched_setscheduler(SCHED_FIFO, prio={prio_val}) failed: {err}; \
                 hint: needs CAP_SYS_NICE or root"
            ));
        }
        Ok(())
    }

    // Pin the process to a single CPU if permitted by the current affinity mask.
    fn try_apply_affinity(rt_cpu: Option<usize>) -> eyre::Result<()> {
        let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        if online < 1 {
            eyre::bail!("_SC_NPROCESSORS_ONLN < 1");
        }
        let target = rt_cpu.unwrap_or(0);
        if target as libc::c_long >= online {
            eyre::bail!("requested CPU {target} >= online {online}");
        }
        if target >= MAX_CPUSET_BITS {
            eyre::bail!("requested CPU {target} exceeds cpu_set_t capacity {MAX_CPUSET_BITS}");
        }
        let mut allowed: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut allowed)
        };
        if rc == 0 && !unsafe { CPU_ISSET(target, &allowed) } {
            eyre::bail!("CPU {target} not permitted by current affinity mask");
        }
        let mut desired: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        unsafe {
            CPU_ZERO(&mut desired);
            CPU_SET(target, &mut desired);
        }
        let rc =
            unsafe { libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &desired) };
        if rc != 0 {
            return Err(eyre::eyre!(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    RT_ONCE.get_or_init(|| {
        match try_apply_mem_lock(lock) {
            Ok(()) => tracing::info!(mode = ?lock, "RT: memory lock applied"),
            Err(err) => tracing::warn!(%err, "mlockall failed"),
        }
        if let Err(err) = try_apply_fifo_priority(prio) {
            tracing::warn!(%err, "SCHED_FIFO not applied");
        }
        if let Err(err) = try_apply_affinity(rt_cpu) {
            tracing::warn!(%err, "affinity not applied");
        }
    });
}

#[cfg(target_os = "macos")]
pub fn setup_rt_once(rt: bool, lock: RtLock) {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();
    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        let flags = match lock {
            RtLock::None => {
                tracing::info!("RT: memory locking disabled (none)");
                return;
            }
            RtLock::Current => MCL_CURRENT,
            RtLock::All => MCL_CURRENT | MCL_FUTURE,
        };
        if unsafe { mlockall(flags) } != 0 {
            let err = std::io::Error::last_os_error();
            tracing::warn!(%err, "mlockall failed");
        } else {
            tracing::info!(mode = ?lock, "RT: memory lock applied");
        }
        tracing::warn!("macOS does not support SCHED_FIFO or affinity; only mlockall applied");
    });
}
