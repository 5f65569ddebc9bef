//! # Equipment Interface
//!
//! This module defines the interfaces used to talk to the equipment on the arm.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod arm;
