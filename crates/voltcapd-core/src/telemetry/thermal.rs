//! Thermal zone discovery and the thermal netlink generic subscription.
//!
//! Netlink receive is only implemented on Linux, which is the only
//! platform the kernel surfaces this system talks to exist on.

use std::path::{Path, PathBuf};

use crate::error::VoltCapError;

/// `{trip_point_or_temp, is_rise}` as delivered by the thermal netlink
/// generic channel. The event code's low bit is treated as the rise flag;
/// the kernel's aux/critical/fault event codes (0/1/2/3) all pass through
/// as `is_rise = code != 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermalEvent {
    pub temp: i32,
    pub is_rise: bool,
}

/// Scan `{base}/thermal_zone{0..10}/type` for the zone whose content equals
/// `wanted` (e.g. `"CPU-therm"`). Returns the zone's directory.
///
/// This is a fatal configuration error: the daemon has no rail to protect
/// without knowing which thermal zone to watch.
pub fn discover_thermal_zone(base: &Path, wanted: &'static str) -> Result<PathBuf, VoltCapError> {
    for i in 0..10 {
        let zone_dir = base.join(format!("thermal_zone{i}"));
        let type_path = zone_dir.join("type");
        let Ok(content) = std::fs::read_to_string(&type_path) else {
            continue;
        };
        if content.trim() == wanted {
            return Ok(zone_dir);
        }
    }
    Err(VoltCapError::ThermalZoneNotFound {
        base: base.to_path_buf(),
        wanted,
    })
}

#[cfg(target_os = "linux")]
mod netlink {
    use super::ThermalEvent;
    use std::io;
    use std::mem;
    use std::os::unix::io::RawFd;

    /// Thermal events multicast group, per the kernel's thermal_genl family.
    const THERMAL_GENL_MCGRP: u32 = 2;

    /// Generic netlink socket bound to the thermal multicast group.
    ///
    /// Held open for the process lifetime (matches the resource discipline
    /// of the source's other sysfs file handles, which are opened and
    /// closed per-operation — the netlink socket is the one exception,
    /// since there is no equivalent of re-opening a multicast subscription
    /// per message).
    pub struct ThermalSocket {
        fd: RawFd,
    }

    impl ThermalSocket {
        pub fn bind() -> io::Result<Self> {
            // SAFETY: libc::socket with valid, constant arguments; the
            // returned fd is owned exclusively by this struct and closed
            // in `Drop`.
            let fd = unsafe { libc::socket(libc::AF_NETLINK, libc::SOCK_RAW, libc::NETLINK_GENERIC) };
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }

            let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
            addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
            addr.nl_pid = unsafe { libc::getpid() as u32 };
            addr.nl_groups = THERMAL_GENL_MCGRP;

            // SAFETY: `addr` is a valid, fully-initialized sockaddr_nl; its
            // size matches the `addrlen` argument.
            let rc = unsafe {
                libc::bind(
                    fd,
                    std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
                    mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
                )
            };
            if rc < 0 {
                let err = io::Error::last_os_error();
                unsafe { libc::close(fd) };
                return Err(err);
            }

            Ok(Self { fd })
        }

        /// Block until a thermal event arrives. On receive failure, the
        /// caller is expected to drop the message and continue — the
        /// kernel resends on the next crossing, so no backoff is needed.
        pub fn recv_event(&self) -> io::Result<ThermalEvent> {
            let mut buf = [0u8; 128];
            let mut src: libc::sockaddr_nl = unsafe { mem::zeroed() };
            let mut iov = libc::iovec {
                iov_base: buf.as_mut_ptr().cast(),
                iov_len: buf.len(),
            };
            let mut msg: libc::msghdr = unsafe { mem::zeroed() };
            msg.msg_name = std::ptr::addr_of_mut!(src).cast();
            msg.msg_namelen = mem::size_of::<libc::sockaddr_nl>() as u32;
            msg.msg_iov = &mut iov;
            msg.msg_iovlen = 1;

            // SAFETY: `buf`, `iov`, and `msg` are all valid for the
            // duration of this call and sized consistently with each
            // other.
            let n = unsafe { libc::recvmsg(self.fd, &mut msg, 0) };
            if n < 0 {
                return Err(io::Error::last_os_error());
            }

            // Skip the generic-netlink message header (nlmsghdr + genlmsghdr)
            // and read the two i32 fields the thermal family sends.
            let nlmsghdr_len = mem::size_of::<libc::nlmsghdr>();
            let genlmsghdr_len = 4; // cmd: u8, version: u8, reserved: u16
            let payload_off = nlmsghdr_len + genlmsghdr_len;
            if (n as usize) < payload_off + 8 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "thermal netlink message too short",
                ));
            }

            let temp = i32::from_ne_bytes(buf[payload_off..payload_off + 4].try_into().unwrap());
            let event_code =
                i32::from_ne_bytes(buf[payload_off + 4..payload_off + 8].try_into().unwrap());

            Ok(ThermalEvent {
                temp,
                is_rise: event_code != 0,
            })
        }
    }

    impl Drop for ThermalSocket {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use netlink::ThermalSocket;

#[cfg(not(target_os = "linux"))]
pub struct ThermalSocket;

#[cfg(not(target_os = "linux"))]
impl ThermalSocket {
    pub fn bind() -> std::io::Result<Self> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "thermal netlink subscription requires Linux",
        ))
    }

    pub fn recv_event(&self) -> std::io::Result<ThermalEvent> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "thermal netlink subscription requires Linux",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_matching_zone_among_siblings() {
        let dir = tempfile::tempdir().unwrap();
        for (i, kind) in ["GPU-therm", "CPU-therm", "PMIC-therm"].iter().enumerate() {
            let zone = dir.path().join(format!("thermal_zone{i}"));
            fs::create_dir_all(&zone).unwrap();
            fs::write(zone.join("type"), format!("{kind}\n")).unwrap();
        }

        let found = discover_thermal_zone(dir.path(), "CPU-therm").unwrap();
        assert_eq!(found, dir.path().join("thermal_zone1"));
    }

    #[test]
    fn missing_zone_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_thermal_zone(dir.path(), "CPU-therm").unwrap_err();
        assert!(matches!(err, VoltCapError::ThermalZoneNotFound { .. }));
    }
}
