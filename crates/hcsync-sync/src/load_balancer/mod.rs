//! Load balancer hierarchy
//!
//! load balancer -> listener -> rule -> target group -> target, plus the
//! ordered security group bindings of each load balancer.

mod lb;
mod listener;
mod pipeline;
mod rule;
mod sg_rel;
mod target;
mod target_group;
