#[cfg(test)]
mod common;
#[cfg(test)]
mod test_diagnostics;
#[cfg(test)]
mod test_layout;
#[cfg(test)]
mod test_scan;
