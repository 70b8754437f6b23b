// Name normalization shared by sheet resolution and header matching.
//
// Supplier workbooks spell the same sheet or column in many ways
// ("Base_Inadi", "BASE INADI", "Báse Inádi"). Everything is compared on a
// single key: upper-cased, accents folded through a fixed table, spaces and
// underscores removed.

/// Accented Latin letters and their unaccented base, upper case only.
/// Lower-case input is upper-cased before lookup.
const ACCENT_TABLE: &[(char, char)] = &[
    ('Á', 'A'),
    ('À', 'A'),
    ('Â', 'A'),
    ('Ã', 'A'),
    ('Ä', 'A'),
    ('É', 'E'),
    ('È', 'E'),
    ('Ê', 'E'),
    ('Ë', 'E'),
    ('Í', 'I'),
    ('Ì', 'I'),
    ('Î', 'I'),
    ('Ï', 'I'),
    ('Ó', 'O'),
    ('Ò', 'O'),
    ('Ô', 'O'),
    ('Õ', 'O'),
    ('Ö', 'O'),
    ('Ú', 'U'),
    ('Ù', 'U'),
    ('Û', 'U'),
    ('Ü', 'U'),
    ('Ç', 'C'),
    ('Ñ', 'N'),
];

fn fold_accent(c: char) -> char {
    ACCENT_TABLE
        .iter()
        .find(|(accented, _)| *accented == c)
        .map(|(_, base)| *base)
        .unwrap_or(c)
}

/// Normalize a sheet or column name into its comparison key.
pub fn normalize(text: &str) -> String {
    text.trim()
        .chars()
        .flat_map(char::to_uppercase)
        .map(fold_accent)
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect()
}

/// Looser key used for salesperson-reference headers, which carry
/// spacing that matters ("NOME RCA" vs "NOME").
///
/// Upper-cases, drops `.`, turns `-` and `_` into spaces and collapses runs
/// of whitespace to a single space.
pub fn header_key(text: &str) -> String {
    let upper: String = text
        .chars()
        .flat_map(char::to_uppercase)
        .map(fold_accent)
        .filter(|c| *c != '.')
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect();
    upper.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spelling_variants_share_a_key() {
        let expected = "BASEINADI";
        assert_eq!(normalize("Base_Inadi"), expected);
        assert_eq!(normalize("BASE INADI"), expected);
        assert_eq!(normalize("báse inádi"), expected);
        assert_eq!(normalize("  base_inadi  "), expected);
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in [
            "Inadimplência Geral",
            "BASE_RCA",
            "vendedores ",
            "Código Unificado",
            "",
            "ÇÃÕ_ éí",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn cedilla_and_tilde_fold() {
        assert_eq!(normalize("Inadimplência"), "INADIMPLENCIA");
        assert_eq!(normalize("Situação"), "SITUACAO");
    }

    #[test]
    fn header_key_keeps_word_boundaries() {
        assert_eq!(header_key("Nome RCA"), "NOME RCA");
        assert_eq!(header_key("nome_rca"), "NOME RCA");
        assert_eq!(header_key("Cód.  Unificado"), "COD UNIFICADO");
        assert_eq!(header_key("MESMO-VEND"), "MESMO VEND");
    }
}
