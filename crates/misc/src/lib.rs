#![no_std]

pub mod cr_stream;
