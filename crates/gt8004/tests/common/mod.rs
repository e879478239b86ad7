// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Common test utilities, mocks, and helpers for integration tests

pub mod helpers;
pub mod mocks;
