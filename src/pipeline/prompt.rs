//! Builds the instruction text sent to the image model.
//!
//! The output is a pure function of the request and the template count: the
//! same inputs always produce the same bytes. The only per-user variation is
//! the hue seed derived from the fid.

use std::fmt::Write;

use super::GenerationRequest;
use crate::constants::{HUE_DEGREES, POPULAR_FOLLOWER_THRESHOLD};

const STYLE: &str = "Highquality 3d realistic Render, dynamic volumetric lighting, depth of field blur, character with realistic shadows.";

const NEGATIVES: &[&str] = &[
    "no low quality",
    "no glitch",
    "no text",
    "no artifacts",
    "no bad anatomy",
    "no poorly drawn face",
    "no extra hands",
    "no double mouth",
    "no double face",
    "no multiple faces",
    "no face merge",
    "no double limbs",
    "no multiple limbs",
    "no extra limbs",
    "no emoji",
    "no objects in background",
    "no background elements",
    "no weird hair with hats",
    "no hair clipping through headphones",
    "no floating accessories",
    "no weird overlaps",
    "no clipping artifacts",
    "no double cigarette",
    "no extra cigarette",
    "no copying character from PFP",
    "no PFP character structure",
    "no PFP body shape",
    "no PFP head shape",
    "no PFP proportions",
    "no copying hands from PFP",
    "no extra hand pairs",
    "no PFP hand poses",
    "no copying PFP onto template",
    "no overlaying PFP on template",
    "no pasting PFP on template",
    "no mixed styles",
    "no 2D elements on 3D",
    "no flat elements",
];

const STRUCTURE_RULES: &[&str] = &[
    "DO NOT copy character structure, body shape, head shape, or features from PFP - use ONLY MY character structure from template.",
    "DO NOT copy character type from PFP (human, animal, creature, robot) - keep MY character type from template.",
    "DO NOT adapt character structure to match PFP - keep MY EXACT character structure, head shape, and features.",
    "DO NOT copy character proportions, body parts, or anatomy from PFP - use ONLY MY character anatomy from template.",
    "The character structure, body, head, and features come 100% from MY template - ZERO from PFP.",
];

const HAND_RULES: &[&str] = &[
    "Use ONLY the hands from MY FIRST template - EXACTLY as shown, in EXACT same position.",
    "COMPLETELY IGNORE all hands, arms, and hand positions from the user's PFP - DO NOT look at them, DO NOT copy them, DO NOT use them.",
    "DO NOT extract hand poses, hand positions, or arm positions from PFP - these are FORBIDDEN.",
    "The number of hands must EXACTLY match MY template - if MY template has 2 hands, result must have ONLY 2 hands.",
    "DO NOT create extra hands, duplicate hands, or additional hand pairs - use ONLY what exists in MY template.",
    "Hands position, structure, and pose come 100% from MY template - ZERO from PFP.",
];

const REMIX_RULES: &[&str] = &[
    "Start with MY 3D character structure from FIRST template - keep EXACT same character structure, pose, and body proportions.",
    "Keep MY EXACT character type, head shape, body shape, and features from template - DO NOT change based on PFP.",
    "Extract ONLY visual elements from PFP: colors, color palette, visual style, expression/emotion, accessories, clothing patterns - NOT character structure.",
    "Apply extracted colors, style, expression, accessories, and clothing to MY character structure - do NOT copy character from PFP.",
    "The result must be MY character rendered in MY 3D style, in MY pose and proportions, with PFP visual elements applied.",
    "DO NOT copy the PFP's character structure, pose, body proportions, or hand positions - always use MY character, pose, proportions, and hands.",
    "DO NOT overlay or paste PFP onto my template - remix PFP visual elements into my 3D character style.",
    "Result must be MY character with PFP visual elements - no copying character structure from PFP, no double elements, no overlays.",
];

const ACCESSORY_FIT: &str = "Accessories (hats, headphones, cigarettes) must fit naturally on my character - no clipping, no duplicates.";

const BACKGROUND: &str = "BACKGROUND: Single solid color. No text, emoji, or objects.";

/// Hue rotation, in degrees, used as the per-user colour seed.
pub fn hue_shift(fid: u64) -> u64 {
    fid % HUE_DEGREES
}

/// Composes the full prompt for a request and a template set of
/// `template_count` images.
pub fn compose_prompt(request: &GenerationRequest, template_count: usize) -> String {
    let mut out = String::new();

    // String formatting into a String can't fail.
    let _ = write!(
        out,
        "Remix the user's profile picture with my 3D styled circle head character. \
         I'm providing {template_count} template images showing my signature 3D character style. \
         The FIRST template (templateBase.jpg) shows my 3D character with circle head in a specific pose - use this EXACT pose and structure. \
         Other templates show my 3D style variations - use them to understand my rendering style, lighting, textures, and character design. "
    );
    push_numbered(&mut out, "CRITICAL - DO NOT COPY CHARACTER FROM PFP:", STRUCTURE_RULES);
    push_numbered(&mut out, "CRITICAL HAND INSTRUCTIONS - READ CAREFULLY:", HAND_RULES);
    push_numbered(&mut out, "CRITICAL REMIX RULES:", REMIX_RULES);
    out.push_str(ACCESSORY_FIT);
    out.push(' ');
    out.push_str(BACKGROUND);
    out.push(' ');
    let _ = write!(
        out,
        "Use FID {} as seed (color hue shifts by {} degrees). ",
        request.fid,
        hue_shift(request.fid)
    );

    let _ = write!(out, "\n\nStyle: {STYLE}\n\n");

    if request.power_badge {
        out.push_str("POWER USER: This user has a Farcaster power badge (influential member). ");
    }
    if request.follower_count > POPULAR_FOLLOWER_THRESHOLD {
        let _ = write!(
            out,
            "POPULAR: This user has {} followers. ",
            request.follower_count
        );
    }
    if !request.bio.is_empty() {
        let _ = write!(out, "Bio: {}\n\n", request.bio);
    }

    out.push_str("IMPORTANT - Avoid these in the image: ");
    out.push_str(&NEGATIVES.join(", "));
    out
}

fn push_numbered(out: &mut String, heading: &str, rules: &[&str]) {
    out.push_str(heading);
    out.push(' ');
    for (index, rule) in rules.iter().enumerate() {
        let _ = write!(out, "{}. {} ", index + 1, rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_PROMPT: &str = "Remix the user's profile picture with my 3D styled circle head character. \
        I'm providing 2 template images showing my signature 3D character style. \
        The FIRST template (templateBase.jpg) shows my 3D character with circle head in a specific pose - use this EXACT pose and structure. \
        Other templates show my 3D style variations - use them to understand my rendering style, \
        lighting, textures, and character design. CRITICAL - DO NOT COPY CHARACTER FROM PFP: 1. \
        DO NOT copy character structure, body shape, head shape, \
        or features from PFP - use ONLY MY character structure from template. 2. \
        DO NOT copy character type from PFP (human, animal, creature, \
        robot) - keep MY character type from template. 3. \
        DO NOT adapt character structure to match PFP - keep MY EXACT character structure, \
        head shape, and features. 4. DO NOT copy character proportions, body parts, \
        or anatomy from PFP - use ONLY MY character anatomy from template. 5. \
        The character structure, body, head, \
        and features come 100% from MY template - ZERO from PFP. \
        CRITICAL HAND INSTRUCTIONS - READ CAREFULLY: 1. \
        Use ONLY the hands from MY FIRST template - EXACTLY as shown, in EXACT same position. \
        2. COMPLETELY IGNORE all hands, arms, \
        and hand positions from the user's PFP - DO NOT look at them, DO NOT copy them, \
        DO NOT use them. 3. DO NOT extract hand poses, hand positions, \
        or arm positions from PFP - these are FORBIDDEN. 4. \
        The number of hands must EXACTLY match MY template - if MY template has 2 hands, \
        result must have ONLY 2 hands. 5. DO NOT create extra hands, duplicate hands, \
        or additional hand pairs - use ONLY what exists in MY template. 6. Hands position, \
        structure, and pose come 100% from MY template - ZERO from PFP. CRITICAL REMIX RULES: \
        1. \
        Start with MY 3D character structure from FIRST template - keep EXACT same character structure, \
        pose, and body proportions. 2. Keep MY EXACT character type, head shape, body shape, \
        and features from template - DO NOT change based on PFP. 3. \
        Extract ONLY visual elements from PFP: colors, color palette, visual style, \
        expression/emotion, accessories, clothing patterns - NOT character structure. 4. \
        Apply extracted colors, style, expression, accessories, \
        and clothing to MY character structure - do NOT copy character from PFP. 5. \
        The result must be MY character rendered in MY 3D style, in MY pose and proportions, \
        with PFP visual elements applied. 6. DO NOT copy the PFP's character structure, pose, \
        body proportions, or hand positions - always use MY character, pose, proportions, \
        and hands. 7. \
        DO NOT overlay or paste PFP onto my template - remix PFP visual elements into my 3D character style. \
        8. \
        Result must be MY character with PFP visual elements - no copying character structure from PFP, \
        no double elements, no overlays. Accessories (hats, headphones, \
        cigarettes) must fit naturally on my character - no clipping, no duplicates. \
        BACKGROUND: Single solid color. No text, emoji, or objects. \
        Use FID 725 as seed (color hue shifts by 5 degrees). \n\nStyle: \
        Highquality 3d realistic Render, dynamic volumetric lighting, depth of field blur, \
        character with realistic shadows.\n\nPOWER USER: \
        This user has a Farcaster power badge (influential member). POPULAR: \
        This user has 10001 followers. Bio: gm frens\n\nIMPORTANT - Avoid these in the image: \
        no low quality, no glitch, no text, no artifacts, no bad anatomy, no poorly drawn face, \
        no extra hands, no double mouth, no double face, no multiple faces, no face merge, \
        no double limbs, no multiple limbs, no extra limbs, no emoji, no objects in background, \
        no background elements, no weird hair with hats, no hair clipping through headphones, \
        no floating accessories, no weird overlaps, no clipping artifacts, no double cigarette, \
        no extra cigarette, no copying character from PFP, no PFP character structure, \
        no PFP body shape, no PFP head shape, no PFP proportions, no copying hands from PFP, \
        no extra hand pairs, no PFP hand poses, no copying PFP onto template, \
        no overlaying PFP on template, no pasting PFP on template, no mixed styles, \
        no 2D elements on 3D, no flat elements";

    fn request(fid: u64, bio: &str, follower_count: u64, power_badge: bool) -> GenerationRequest {
        GenerationRequest {
            fid,
            avatar_url: "https://example.org/pfp.png".to_string(),
            bio: bio.to_string(),
            follower_count,
            power_badge,
            generation_id: "gen-1".to_string(),
        }
    }

    #[test]
    fn same_request_same_prompt() {
        let req = request(725, "gm", 12_000, true);
        assert_eq!(compose_prompt(&req, 3), compose_prompt(&req, 3));
        assert_ne!(compose_prompt(&req, 3), compose_prompt(&req, 4));
    }

    #[test]
    fn hue_is_fid_mod_360() {
        assert_eq!(hue_shift(725), 5);
        assert_eq!(hue_shift(360), 0);
        assert_eq!(hue_shift(359), 359);

        let prompt = compose_prompt(&request(725, "", 0, false), 1);
        assert!(prompt.contains("Use FID 725 as seed (color hue shifts by 5 degrees)."));
        let prompt = compose_prompt(&request(360, "", 0, false), 1);
        assert!(prompt.contains("hue shifts by 0 degrees"));
    }

    #[test]
    fn badge_adds_power_user_clause() {
        let with = compose_prompt(&request(1, "", 0, true), 1);
        let without = compose_prompt(&request(1, "", 0, false), 1);
        assert!(with.contains("POWER USER:"));
        assert!(!without.contains("POWER USER:"));
    }

    #[test]
    fn popularity_is_strictly_above_threshold() {
        let popular = compose_prompt(&request(1, "", 10_001, false), 1);
        assert!(popular.contains("POPULAR: This user has 10001 followers."));
        let borderline = compose_prompt(&request(1, "", 10_000, false), 1);
        assert!(!borderline.contains("POPULAR:"));
    }

    #[test]
    fn empty_bio_is_omitted() {
        let prompt = compose_prompt(&request(1, "", 0, false), 1);
        assert!(!prompt.contains("Bio:"));
        let prompt = compose_prompt(&request(1, "builder of {weird} things", 0, false), 1);
        assert!(prompt.contains("Bio: builder of {weird} things\n\n"));
    }

    #[test]
    fn clauses_appear_in_fixed_order() {
        let prompt = compose_prompt(&request(42, "builder", 50_000, true), 2);
        let order = [
            "I'm providing 2 template images",
            "CRITICAL - DO NOT COPY CHARACTER FROM PFP: 1. ",
            "CRITICAL HAND INSTRUCTIONS - READ CAREFULLY: 1. ",
            "CRITICAL REMIX RULES: 1. ",
            "Accessories (hats, headphones, cigarettes)",
            "BACKGROUND: Single solid color.",
            "Use FID 42 as seed",
            "\n\nStyle: Highquality 3d realistic Render",
            "POWER USER:",
            "POPULAR: This user has 50000 followers.",
            "Bio: builder",
            "IMPORTANT - Avoid these in the image: no low quality, no glitch",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|needle| prompt.find(needle).unwrap_or_else(|| panic!("missing {needle:?}")))
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(prompt.ends_with("no 2D elements on 3D, no flat elements"));
    }

    #[test]
    fn full_prompt_matches_reference_text() {
        let prompt = compose_prompt(&request(725, "gm frens", 10_001, true), 2);
        assert_eq!(prompt, FULL_PROMPT);
    }
}
