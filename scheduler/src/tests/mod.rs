#[cfg(test)]
mod common;
#[cfg(test)]
mod test_delayed;
#[cfg(test)]
mod test_exit;
