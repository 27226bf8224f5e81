//! DRAT step encoding.
use std::io::{self, Write};

use kitesat_formula::Lit;

/// Write a clause addition or deletion in textual DRAT format.
pub fn write_step(target: &mut impl Write, add: bool, clause: &[Lit]) -> io::Result<()> {
    if !add {
        target.write_all(b"d ")?;
    }
    write_literals(target, clause)
}

/// Write a clause addition or deletion in binary DRAT format.
pub fn write_binary_step(target: &mut impl Write, add: bool, clause: &[Lit]) -> io::Result<()> {
    if add {
        target.write_all(b"a")?;
    } else {
        target.write_all(b"d")?;
    }
    write_binary_literals(target, clause)
}

/// Write the literals of a clause for a step in a textual DRAT proof.
fn write_literals(target: &mut impl Write, literals: &[Lit]) -> io::Result<()> {
    for &lit in literals {
        itoa::write(&mut *target, lit.to_dimacs())?;
        target.write_all(b" ")?;
    }
    target.write_all(b"0\n")?;
    Ok(())
}

/// Write the literals of a clause for a step in a binary DRAT proof.
fn write_binary_literals(target: &mut impl Write, literals: &[Lit]) -> io::Result<()> {
    for &lit in literals {
        let drat_code = lit.code() as u64 + 2;
        leb128::write::unsigned(target, drat_code)?;
    }
    target.write_all(&[0])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use kitesat_formula::lits;

    #[test]
    fn text_steps() {
        let mut out = vec![];
        write_step(&mut out, true, &lits![1, -2, 3]).unwrap();
        write_step(&mut out, false, &lits![-1]).unwrap();
        write_step(&mut out, true, &[]).unwrap();

        assert_eq!(out, b"1 -2 3 0\nd -1 0\n0\n");
    }

    #[test]
    fn binary_steps() {
        let mut out = vec![];
        write_binary_step(&mut out, true, &lits![1, -2]).unwrap();
        write_binary_step(&mut out, false, &lits![1]).unwrap();

        // Literal n encodes as 2|n| + sign over the 1-based variable numbering.
        assert_eq!(out, b"a\x02\x05\x00d\x02\x00");
    }
}
