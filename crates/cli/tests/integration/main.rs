mod common;

#[cfg(unix)]
mod build_tests;
#[cfg(unix)]
mod maintenance_tests;
