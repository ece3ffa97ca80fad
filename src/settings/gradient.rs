// SPDX-License-Identifier: GPL-3.0-or-later
use colorous::Gradient;

/// Every colorous gradient that can be named in the configuration.
const GRADIENTS: &[(&str, Gradient)] = &[
    ("BLUES", colorous::BLUES),
    ("BLUE_GREEN", colorous::BLUE_GREEN),
    ("BLUE_PURPLE", colorous::BLUE_PURPLE),
    ("BROWN_GREEN", colorous::BROWN_GREEN),
    ("CIVIDIS", colorous::CIVIDIS),
    ("COOL", colorous::COOL),
    ("CUBEHELIX", colorous::CUBEHELIX),
    ("GREENS", colorous::GREENS),
    ("GREEN_BLUE", colorous::GREEN_BLUE),
    ("GREYS", colorous::GREYS),
    ("INFERNO", colorous::INFERNO),
    ("MAGMA", colorous::MAGMA),
    ("ORANGES", colorous::ORANGES),
    ("ORANGE_RED", colorous::ORANGE_RED),
    ("PINK_GREEN", colorous::PINK_GREEN),
    ("PLASMA", colorous::PLASMA),
    ("PURPLES", colorous::PURPLES),
    ("PURPLE_BLUE", colorous::PURPLE_BLUE),
    ("PURPLE_BLUE_GREEN", colorous::PURPLE_BLUE_GREEN),
    ("PURPLE_GREEN", colorous::PURPLE_GREEN),
    ("PURPLE_ORANGE", colorous::PURPLE_ORANGE),
    ("PURPLE_RED", colorous::PURPLE_RED),
    ("RAINBOW", colorous::RAINBOW),
    ("REDS", colorous::REDS),
    ("RED_BLUE", colorous::RED_BLUE),
    ("RED_GREY", colorous::RED_GREY),
    ("RED_PURPLE", colorous::RED_PURPLE),
    ("RED_YELLOW_BLUE", colorous::RED_YELLOW_BLUE),
    ("RED_YELLOW_GREEN", colorous::RED_YELLOW_GREEN),
    ("SINEBOW", colorous::SINEBOW),
    ("SPECTRAL", colorous::SPECTRAL),
    ("TURBO", colorous::TURBO),
    ("VIRIDIS", colorous::VIRIDIS),
    ("WARM", colorous::WARM),
    ("YELLOW_GREEN", colorous::YELLOW_GREEN),
    ("YELLOW_GREEN_BLUE", colorous::YELLOW_GREEN_BLUE),
    ("YELLOW_ORANGE_BROWN", colorous::YELLOW_ORANGE_BROWN),
    ("YELLOW_ORANGE_RED", colorous::YELLOW_ORANGE_RED),
];

/// Look up a colorous gradient by name.
///
/// Names are case-insensitive, and spaces, dashes and underscores are interchangeable.
pub(crate) fn from_str(gradient_name: &str) -> Option<Gradient> {
    let normalized = gradient_name
        .trim()
        .to_uppercase()
        .replace(|c: char| c == ' ' || c == '-', "_");
    GRADIENTS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, gradient)| *gradient)
}

/// Compare gradients by their debug representation, as [Gradient] doesn't implement [PartialEq].
pub(crate) fn same_gradient(left: &Gradient, right: &Gradient) -> bool {
    format!("{:?}", left) == format!("{:?}", right)
}
