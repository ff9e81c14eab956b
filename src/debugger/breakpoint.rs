/// Set of breakpoint addresses, kept sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Breakpoints(Vec<u16>);

impl Breakpoints {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, address: u16) -> bool {
        self.0.binary_search(&address).is_ok()
    }

    /// Returns `false` if a breakpoint already existed at `address`.
    pub fn insert(&mut self, address: u16) -> bool {
        match self.0.binary_search(&address) {
            Ok(_) => false,
            Err(index) => {
                self.0.insert(index, address);
                true
            }
        }
    }

    /// Returns whether a breakpoint was found with given address.
    pub fn remove(&mut self, address: u16) -> bool {
        match self.0.binary_search(&address) {
            Ok(index) => {
                self.0.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<u16>> for Breakpoints {
    fn from(mut vec: Vec<u16>) -> Self {
        vec.sort_unstable();
        vec.dedup();
        Self(vec)
    }
}
