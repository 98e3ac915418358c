//! Kernel structures and attribute numbering for rtnetlink families.
//!
//! Everything here mirrors a C definition from `<linux/rtnetlink.h>`,
//! `<linux/if_link.h>`, `<linux/if_addr.h>`, `<linux/neighbour.h>` or
//! `<linux/mpls.h>`, laid out with zerocopy so it can be read straight out
//! of a datagram.

pub mod addr;
pub mod link;
pub mod mpls;
pub mod neigh;
pub mod route;
