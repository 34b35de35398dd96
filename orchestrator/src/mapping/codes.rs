// Enumerated code translations (form value -> two-digit CRM code)
//
// Matching is case-insensitive and accent-tolerant for the common Spanish/English labels the
// form can post. Absent or unrecognized values map to `UNKNOWN_CODE`.

pub const UNKNOWN_CODE: &str = "00";

pub fn gender_code(value: Option<&str>) -> &'static str {
    match normalize(value).as_deref() {
        Some("01" | "m" | "male" | "man" | "hombre" | "masculino" | "varon") => "01",
        Some("02" | "f" | "female" | "woman" | "mujer" | "femenino") => "02",
        _ => UNKNOWN_CODE,
    }
}

pub fn marital_status_code(value: Option<&str>) -> &'static str {
    match normalize(value).as_deref() {
        Some("01" | "single" | "soltero" | "soltera") => "01",
        Some("02" | "married" | "casado" | "casada") => "02",
        Some("03" | "divorced" | "divorciado" | "divorciada") => "03",
        Some("04" | "widowed" | "viudo" | "viuda") => "04",
        Some("05" | "separated" | "separado" | "separada") => "05",
        Some("06" | "domestic partner" | "pareja de hecho") => "06",
        _ => UNKNOWN_CODE,
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    let v = value?.trim();
    if v.is_empty() {
        return None;
    }
    Some(
        v.to_lowercase()
            .chars()
            .map(|c| match c {
                'á' => 'a',
                'é' => 'e',
                'í' => 'i',
                'ó' => 'o',
                'ú' | 'ü' => 'u',
                other => other,
            })
            .collect(),
    )
}
