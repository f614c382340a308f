/// Subset of `0..universe` with O(1) insert, remove, membership and
/// uniform access by position.
#[derive(Debug, Clone)]
pub struct IndexedSet {
    items: Vec<usize>,
    /// position in `items`, or `NONE`
    pos: Vec<usize>,
}

const NONE: usize = usize::MAX;

impl IndexedSet {
    pub fn new(universe: usize) -> Self {
        IndexedSet {
            items: Vec::new(),
            pos: vec![NONE; universe],
        }
    }

    pub fn full(universe: usize) -> Self {
        IndexedSet {
            items: (0..universe).collect(),
            pos: (0..universe).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn contains(&self, x: usize) -> bool {
        self.pos[x] != NONE
    }

    /// Element at position `i`; positions shift on removal
    #[inline]
    pub fn get(&self, i: usize) -> usize {
        self.items[i]
    }

    pub fn insert(&mut self, x: usize) -> bool {
        if self.contains(x) {
            return false;
        }
        self.pos[x] = self.items.len();
        self.items.push(x);
        true
    }

    pub fn remove(&mut self, x: usize) -> bool {
        let i = self.pos[x];
        if i == NONE {
            return false;
        }
        self.items.swap_remove(i);
        if let Some(&moved) = self.items.get(i) {
            self.pos[moved] = i;
        }
        self.pos[x] = NONE;
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.items.iter().copied()
    }
}
