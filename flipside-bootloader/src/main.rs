// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! HBox bootloader for STM32H750: stages the active application from the
//! external QSPI flash into AXI SRAM and jumps to it.

#![no_std]
#![no_main]

mod boot;
mod flash;

use defmt_rtt as _;
use panic_probe as _;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[entry]
fn main() -> ! {
    defmt::println!("HBox bootloader {=str}", env!("CARGO_PKG_VERSION"));

    let mut store = flash::XipFlash::new();
    boot::run(&mut store)
}
