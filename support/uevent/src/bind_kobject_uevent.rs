// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// UNSAFETY: Calling SockAddr::try_init.
#![expect(unsafe_code)]

use socket2::SockAddr;
use socket2::Socket;
use std::io;

/// Multicast group the kernel broadcasts kobject uevents on.
const KERNEL_UEVENT_GROUP: u32 = 1;

/// Receive buffer requested for the socket. Bursts of hotplug events larger
/// than this are reported as an overflow.
const RECV_BUFFER_SIZE: usize = 256 * 1024;

/// Opens a blocking netlink socket subscribed to kernel kobject uevents.
pub(crate) fn bind_kobject_uevent_socket() -> io::Result<Socket> {
    let socket = Socket::new(
        libc::PF_NETLINK.into(),
        socket2::Type::DGRAM.cloexec(),
        Some(libc::NETLINK_KOBJECT_UEVENT.into()),
    )?;

    if let Err(err) = socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        tracing::debug!(
            error = &err as &dyn std::error::Error,
            "could not grow uevent receive buffer"
        );
    }

    socket.bind(&kernel_group_address()?)?;
    Ok(socket)
}

fn kernel_group_address() -> io::Result<SockAddr> {
    // SAFETY: Address family (AF_NETLINK) and length matches the type of storage (sockaddr_nl).
    let ((), sockaddr) = unsafe {
        SockAddr::try_init(|storage, len| {
            let mut address: libc::sockaddr_nl = std::mem::zeroed();
            address.nl_family = libc::AF_NETLINK as _;
            address.nl_groups = KERNEL_UEVENT_GROUP;
            storage.cast::<libc::sockaddr_nl>().write(address);
            len.write(size_of::<libc::sockaddr_nl>() as u32);
            Ok(())
        })?
    };
    Ok(sockaddr)
}
