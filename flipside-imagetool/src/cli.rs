// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "flipside-imagetool")]
#[command(about = "Image tool for HBox dual-slot firmware")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Build a firmware metadata record from component binaries
    Manifest {
        /// Firmware version string (e.g. 2.1.0)
        #[arg(short, long)]
        version: String,

        /// Build date string (e.g. 2026-08-25)
        #[arg(long)]
        build_date: String,

        /// Target slot (0 = A, 1 = B)
        #[arg(long, default_value = "0")]
        slot: u8,

        /// Application binary
        #[arg(long, value_name = "FILE")]
        application: Option<PathBuf>,

        /// Web resources binary
        #[arg(long, value_name = "FILE")]
        webresources: Option<PathBuf>,

        /// ADC mapping binary
        #[arg(long, value_name = "FILE")]
        adc_mapping: Option<PathBuf>,

        /// Output metadata record
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Decode, validate and print a metadata record
    Inspect {
        /// Metadata record file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Extract the bootloader section table from a linked application ELF
    Sections {
        /// Application ELF file
        #[arg(value_name = "ELF")]
        elf: PathBuf,

        /// Output section-table blob
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// objdump binary to use
        #[arg(long, default_value = "arm-none-eabi-objdump")]
        objdump: String,
    },

    /// Split a component binary into a checksummed chunk pack
    Chunks {
        /// Component binary file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Component name (application, webresources, adc_mapping)
        #[arg(short, long)]
        component: String,

        /// Target slot (0 = A, 1 = B)
        #[arg(long, default_value = "0")]
        slot: u8,

        /// Upgrade session id the pack is addressed to
        #[arg(short, long)]
        session: String,

        /// Output chunk pack
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Manifest {
            version,
            build_date,
            slot,
            application,
            webresources,
            adc_mapping,
            output,
        } => commands::manifest(
            &version,
            &build_date,
            slot,
            application.as_deref(),
            webresources.as_deref(),
            adc_mapping.as_deref(),
            &output,
        ),
        Commands::Inspect { file } => commands::inspect(&file),
        Commands::Sections {
            elf,
            output,
            objdump,
        } => commands::sections(&elf, &output, &objdump),
        Commands::Chunks {
            file,
            component,
            slot,
            session,
            output,
        } => commands::chunks(&file, &component, slot, &session, &output),
    }
}
