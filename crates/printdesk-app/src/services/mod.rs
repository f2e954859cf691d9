// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — builds the scheduler and its collaborators from the data
// directory and configuration.

pub mod app_services;
pub mod data_dir;
