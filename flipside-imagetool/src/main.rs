// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host-side image tool for HBox dual-slot firmware.
//!
//! Usage:
//!   flipside-imagetool manifest --version 2.1.0 --build-date 2026-08-25 \
//!       --slot 0 --application app.bin -o metadata.bin
//!   flipside-imagetool inspect metadata.bin
//!   flipside-imagetool sections firmware.elf -o section_table.bin
//!   flipside-imagetool chunks app.bin --component application --slot 1 \
//!       --session s1 -o app.pack

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
