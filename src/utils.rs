// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use rand::Rng;

/// Generates a random ISID (6 bytes, OUI format: the two type bits are
/// cleared) and returns:
/// - `[u8; 6]` for direct use in the PDU
/// - `String` containing its hexadecimal representation (no prefix)
pub fn generate_isid() -> ([u8; 6], String) {
    let mut isid = [0u8; 6];
    rand::rng().fill(&mut isid);

    isid[0] &= 0x3F;

    (isid, hex::encode(isid))
}
