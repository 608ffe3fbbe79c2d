//! SolarGrid Parser - transfer instructions out of oracle prose
//!
//! The decision oracle emits free text that mixes commentary with
//! instruction lines in a fixed grammar:
//!
//! ```text
//! Wallet 0x<sender> sends <amount> SOLAR to Wallet 0x<recipient> on Sonic Network.
//! ```
//!
//! This crate is the only place that grammar lives. Everything downstream
//! works on structured [`Instruction`] values, so swapping the oracle to a
//! typed response format would only touch this crate.
//!
//! Parsing is total: unmatched text is ignored and "no instructions" is an
//! empty vec, never an error.

use regex::Regex;
use solargrid_types::{Instruction, WalletAddress};
use std::sync::OnceLock;

const GRAMMAR: &str =
    r"Wallet (0x[a-fA-F0-9]+) sends (\d+) SOLAR to Wallet (0x[a-fA-F0-9]+) on Sonic Network\.";

fn grammar() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The pattern is a compile-time constant; it cannot fail to build.
    RE.get_or_init(|| Regex::new(GRAMMAR).unwrap())
}

/// Extract every instruction from `text`, in left-to-right order.
///
/// Zero-amount matches and amounts too large for `u64` are dropped: the
/// grammar promises positive integer token counts, and anything else is
/// malformed oracle output, not a trade.
pub fn parse(text: &str) -> Vec<Instruction> {
    grammar()
        .captures_iter(text)
        .filter_map(|caps| {
            let amount: u64 = caps[2].parse().ok()?;
            if amount == 0 {
                return None;
            }
            Some(Instruction {
                sender: WalletAddress::new(&caps[1]),
                recipient: WalletAddress::new(&caps[3]),
                amount,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const H1: &str = "0xE860ADA0513Cd6490684BC23e04B27E410DE84FC";
    const H3: &str = "0x5EFF96BE67aa638E17Fef1Aa682038E8B9F77CC6";
    const GRID: &str = "0x2BD22357d36c99EF3aE117D7cD4170A2Ea30B98A";

    fn line(sender: &str, amount: u64, recipient: &str) -> String {
        format!("Wallet {sender} sends {amount} SOLAR to Wallet {recipient} on Sonic Network.")
    }

    #[test]
    fn extracts_instructions_interleaved_with_prose() {
        let text = format!(
            "Based on the energy flow analysis:\n\
             - {}\n\
             House H3 had a deficit of 2 kWh this round.\n\
             - {}\n\
             All other houses are balanced.",
            line(H3, 2, H1),
            line(H1, 5, GRID),
        );
        let instructions = parse(&text);
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].sender, WalletAddress::new(H3));
        assert_eq!(instructions[0].recipient, WalletAddress::new(H1));
        assert_eq!(instructions[0].amount, 2);
        assert_eq!(instructions[1].amount, 5);
    }

    #[test]
    fn preserves_left_to_right_order() {
        let text = format!("{} {} {}", line(H1, 1, H3), line(H3, 2, GRID), line(GRID, 3, H1));
        let amounts: Vec<u64> = parse(&text).iter().map(|i| i.amount).collect();
        assert_eq!(amounts, vec![1, 2, 3]);
    }

    #[test]
    fn zero_amount_is_excluded_one_is_included() {
        let text = format!("{}\n{}", line(H1, 0, H3), line(H1, 1, H3));
        let instructions = parse(&text);
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].amount, 1);
    }

    #[test]
    fn negative_amounts_do_not_match_the_grammar() {
        let text = format!("Wallet {H1} sends -5 SOLAR to Wallet {H3} on Sonic Network.");
        assert!(parse(&text).is_empty());
    }

    #[test]
    fn no_instructions_yields_empty_not_error() {
        assert!(parse("The grid is perfectly balanced today.").is_empty());
        assert!(parse("").is_empty());
    }

    #[test]
    fn parse_is_pure() {
        let text = line(H3, 2, H1);
        assert_eq!(parse(&text), parse(&text));
    }

    #[test]
    fn punctuation_must_match_exactly() {
        // Missing trailing period
        let text = format!("Wallet {H1} sends 2 SOLAR to Wallet {H3} on Sonic Network");
        assert!(parse(&text).is_empty());
    }

    #[test]
    fn mixed_case_addresses_are_accepted() {
        let lower = line(&H1.to_ascii_lowercase(), 4, &H3.to_ascii_lowercase());
        let parsed = parse(&lower);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].sender, WalletAddress::new(H1));
    }

    #[test]
    fn overflowing_amount_is_dropped() {
        let text = line(H1, 1, H3).replace("sends 1 ", "sends 99999999999999999999999999 ");
        assert!(parse(&text).is_empty());
    }
}
