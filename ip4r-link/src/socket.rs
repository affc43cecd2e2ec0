//
// socket.rs - Raw Packet Sockets per Interface
//
// Purpose:
//   Opens and manages one AF_PACKET socket per router interface and exposes
//   them through the core's LinkLayer trait: blocking multi-interface
//   receive, per-interface transmit, and cached IPv4/MAC address lookups.
//
// How it works:
//   - socket(AF_PACKET, SOCK_RAW, htons(ETH_P_ALL)) yields a descriptor that
//     exchanges complete Ethernet frames with one device once bound to it
//     via sockaddr_ll (interface index from SIOCGIFINDEX).
//   - The interface's IPv4 (SIOCGIFADDR) and hardware address (SIOCGIFHWADDR)
//     are read once at bring-up; the router treats them as fixed.
//   - recv_any polls all descriptors with an infinite timeout and reads from
//     the first readable one, returning the frame length and the dense
//     interface index the core uses everywhere.
//

use ip4r_core::LinkLayer;
use std::io;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd as _, FromRawFd as _, OwnedFd};

/// ETH_P_ALL in network byte order, as both the socket protocol and the
/// sockaddr_ll protocol want it.
const ETH_P_ALL_BE: u16 = (libc::ETH_P_ALL as u16).to_be();

struct Iface {
    name: String,
    fd: OwnedFd,
    ipv4: Ipv4Addr,
    mac: [u8; 6],
}

/// The production link layer: a fixed set of raw packet sockets, one per
/// attached interface, indexed in configuration order.
pub struct PacketLink {
    ifaces: Vec<Iface>,
}

fn ifreq_for(name: &str) -> io::Result<libc::ifreq> {
    let mut req: libc::ifreq = unsafe { std::mem::zeroed() };
    let bytes = name.as_bytes();
    if bytes.len() >= req.ifr_name.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("interface name too long: {name}"),
        ));
    }
    for (dst, src) in req.ifr_name.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }
    Ok(req)
}

impl Iface {
    fn open(name: &str) -> io::Result<Self> {
        let fd = unsafe {
            let fd = libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                i32::from(ETH_P_ALL_BE),
            );
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            OwnedFd::from_raw_fd(fd)
        };
        let raw_fd = fd.as_raw_fd();

        let if_index = unsafe {
            let mut req = ifreq_for(name)?;
            if libc::ioctl(raw_fd, libc::SIOCGIFINDEX, &mut req) < 0 {
                return Err(io::Error::other(format!(
                    "no such interface {name}: {}",
                    io::Error::last_os_error()
                )));
            }
            req.ifr_ifru.ifru_ifindex
        };

        unsafe {
            let mut sll: libc::sockaddr_ll = std::mem::zeroed();
            sll.sll_family = libc::AF_PACKET as libc::sa_family_t;
            sll.sll_protocol = ETH_P_ALL_BE;
            sll.sll_ifindex = if_index;
            if libc::bind(
                raw_fd,
                &sll as *const _ as *const libc::sockaddr,
                size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            ) < 0
            {
                return Err(io::Error::other(format!(
                    "failed to bind to {name}: {}",
                    io::Error::last_os_error()
                )));
            }
        }

        let ipv4 = unsafe {
            let mut req = ifreq_for(name)?;
            if libc::ioctl(raw_fd, libc::SIOCGIFADDR, &mut req) < 0 {
                return Err(io::Error::other(format!(
                    "no IPv4 address on {name}: {}",
                    io::Error::last_os_error()
                )));
            }
            let sin = &req.ifr_ifru.ifru_addr as *const libc::sockaddr as *const libc::sockaddr_in;
            Ipv4Addr::from(u32::from_be((*sin).sin_addr.s_addr))
        };

        let mac = unsafe {
            let mut req = ifreq_for(name)?;
            if libc::ioctl(raw_fd, libc::SIOCGIFHWADDR, &mut req) < 0 {
                return Err(io::Error::other(format!(
                    "no hardware address on {name}: {}",
                    io::Error::last_os_error()
                )));
            }
            let mut mac = [0u8; 6];
            for (dst, src) in mac.iter_mut().zip(&req.ifr_ifru.ifru_hwaddr.sa_data[..6]) {
                *dst = *src as u8;
            }
            mac
        };

        Ok(Iface {
            name: name.to_string(),
            fd,
            ipv4,
            mac,
        })
    }
}

impl PacketLink {
    /// Opens a packet socket on every named interface. The position of a
    /// name in `names` becomes its interface index.
    pub fn open(names: &[String]) -> io::Result<Self> {
        let mut ifaces = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let iface = Iface::open(name)?;
            log::info!(
                "interface {index}: {} ipv4 {} mac {}",
                iface.name,
                iface.ipv4,
                eui48::MacAddress::new(iface.mac).to_hex_string()
            );
            ifaces.push(iface);
        }
        Ok(PacketLink { ifaces })
    }

    /// Number of attached interfaces.
    pub fn len(&self) -> usize {
        self.ifaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ifaces.is_empty()
    }
}

impl LinkLayer for PacketLink {
    fn recv_any(&mut self, buf: &mut [u8]) -> io::Result<(usize, u32)> {
        loop {
            let mut fds: Vec<libc::pollfd> = self
                .ifaces
                .iter()
                .map(|iface| libc::pollfd {
                    fd: iface.fd.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                })
                .collect();
            let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if ready < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            for (index, pfd) in fds.iter().enumerate() {
                if pfd.revents & libc::POLLIN != 0 {
                    let got = unsafe {
                        libc::read(pfd.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
                    };
                    if got < 0 {
                        return Err(io::Error::last_os_error());
                    }
                    return Ok((got as usize, index as u32));
                }
            }
        }
    }

    fn send(&mut self, if_index: u32, frame: &[u8]) -> io::Result<usize> {
        let iface = self.ifaces.get(if_index as usize).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no interface with index {if_index}"),
            )
        })?;
        let sent = unsafe {
            libc::write(
                iface.fd.as_raw_fd(),
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
            )
        };
        if sent < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(sent as usize)
    }

    fn ipv4(&self, if_index: u32) -> Ipv4Addr {
        self.ifaces[if_index as usize].ipv4
    }

    fn mac(&self, if_index: u32) -> [u8; 6] {
        self.ifaces[if_index as usize].mac
    }
}
