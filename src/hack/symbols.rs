use std::collections::HashMap;

/// The assembler's symbol table. Entries keep their first-reference
/// order so variable addresses come out deterministic; an unresolved
/// entry is one referenced by `@NAME` before any binding.
pub struct SymbolTable {
    entries: Vec<(String, Option<u16>)>,
    index: HashMap<String, usize>,
}

/// RAM addresses handed to variables start here.
const FIRST_VARIABLE_ADDRESS: u16 = 16;

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Pre-seeded with the machine registers and device addresses.
    pub fn new() -> Self {
        let mut table = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };
        table.bind("SP", 0);
        table.bind("LCL", 1);
        table.bind("ARG", 2);
        table.bind("THIS", 3);
        table.bind("THAT", 4);
        for r in 0..16u16 {
            table.bind(&format!("R{}", r), r);
        }
        table.bind("SCREEN", 16384);
        table.bind("KBD", 24576);
        table
    }

    /// Bind a label to an instruction address. The first binding wins;
    /// an earlier `@NAME` reference is filled in.
    pub fn bind(&mut self, name: &str, address: u16) {
        match self.index.get(name) {
            Some(&i) => {
                if self.entries[i].1.is_none() {
                    self.entries[i].1 = Some(address);
                }
            }
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), Some(address)));
            }
        }
    }

    /// Record an `@NAME` reference; a fresh name enters unresolved.
    pub fn reference(&mut self, name: &str) {
        if !self.index.contains_key(name) {
            self.index.insert(name.to_string(), self.entries.len());
            self.entries.push((name.to_string(), None));
        }
    }

    /// Hand out RAM addresses to every name still unresolved, in
    /// first-reference order. Runs once, after all labels are bound.
    pub fn resolve_variables(&mut self) {
        let mut address = FIRST_VARIABLE_ADDRESS;
        for entry in &mut self.entries {
            if entry.1.is_none() {
                entry.1 = Some(address);
                address += 1;
            }
        }
    }

    pub fn address_of(&self, name: &str) -> Option<u16> {
        self.index
            .get(name)
            .and_then(|&i| self.entries[i].1)
    }
}
