//! Behavioural suites for the module mapper daemon.

mod support;
