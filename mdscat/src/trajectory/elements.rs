/// Tabulated properties of one chemical element (or isotope).
///
/// Scattering lengths are in fm, masses in g/mol.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElementProperties {
    pub symbol: &'static str,
    pub mass: f64,
    pub b_coherent: f64,
    pub b_incoherent: f64,
}


const fn el(symbol: &'static str, mass: f64, b_coherent: f64, b_incoherent: f64) -> ElementProperties {
    ElementProperties { symbol, mass, b_coherent, b_incoherent }
}


static ELEMENTS: &[ElementProperties] = &[
    el("H",   1.008,  -3.739,  25.274),
    el("D",   2.014,   6.671,   4.04),
    el("C",  12.011,   6.646,   0.0),
    el("N",  14.007,   9.36,    2.0),
    el("O",  15.999,   5.803,   0.0),
    el("F",  18.998,   5.654,  -0.082),
    el("Na", 22.990,   3.63,    3.59),
    el("Mg", 24.305,   5.375,   0.0),
    el("Si", 28.086,   4.1491,  0.0),
    el("P",  30.974,   5.13,    0.2),
    el("S",  32.06,    2.847,   0.0),
    el("K",  39.098,   3.67,    0.0),
    el("Ar", 39.948,   1.909,   0.0),
    el("Ca", 40.078,   4.70,    0.0),
    el("Fe", 55.845,   9.45,    0.0),
    el("Cu", 63.546,   7.718,   0.0),
    el("Zn", 65.38,    5.680,   0.0),
];


/// Names accepted by [`property`].
pub const PROPERTY_NAMES: &[&str] = &["equal", "mass", "b_coherent", "b_incoherent"];


/// Case-insensitive lookup by symbol.
pub fn element(symbol: &str) -> Option<&'static ElementProperties> {
    let symbol = symbol.trim();
    ELEMENTS.iter().find(|e| e.symbol.eq_ignore_ascii_case(symbol))
}


/// Value of property `name` for `symbol`. `"equal"` is 1 for any symbol, tabulated
/// or not.
pub fn property(symbol: &str, name: &str) -> Option<f64> {
    if name == "equal" {
        return Some(1.0);
    }
    let e = element(symbol)?;
    match name {
        "equal" => Some(1.0),
        "mass" => Some(e.mass),
        "b_coherent" => Some(e.b_coherent),
        "b_incoherent" => Some(e.b_incoherent),
        _ => None,
    }
}


pub fn symbols() -> impl Iterator<Item = &'static str> {
    ELEMENTS.iter().map(|e| e.symbol)
}
