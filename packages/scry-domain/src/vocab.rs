//! Closed vocabulary the intent extractor recognizes.
//!
//! Every entry maps a lower-case phrase (one to four words) to a single [`Term`]. Phrases are
//! matched longest-first, so "very cheap" wins over "cheap" and "for commander" over
//! "commander".

use std::{collections::HashMap, sync::LazyLock};

use serde::{Deserialize, Serialize};

/// Longest phrase, in words, present in any table below.
pub const MAX_PHRASE_WORDS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Color {
	White,
	Blue,
	Black,
	Red,
	Green,
	Colorless,
}
impl Color {
	pub fn letter(self) -> char {
		match self {
			Self::White => 'w',
			Self::Blue => 'u',
			Self::Black => 'b',
			Self::Red => 'r',
			Self::Green => 'g',
			Self::Colorless => 'c',
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Self::White => "white",
			Self::Blue => "blue",
			Self::Black => "black",
			Self::Red => "red",
			Self::Green => "green",
			Self::Colorless => "colorless",
		}
	}

	pub fn from_letter(letter: char) -> Option<Self> {
		match letter.to_ascii_lowercase() {
			'w' => Some(Self::White),
			'u' => Some(Self::Blue),
			'b' => Some(Self::Black),
			'r' => Some(Self::Red),
			'g' => Some(Self::Green),
			'c' => Some(Self::Colorless),
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BudgetLevel {
	VeryCheap,
	Cheap,
	Expensive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modifier {
	/// Colors describe a deck's color identity.
	Identity,
	/// Colors must match exactly.
	Exact,
	And,
	Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Term {
	/// `named` marks guild, shard and wedge names, which never count as ambiguous.
	Color { colors: &'static [Color], named: bool },
	Type(&'static str),
	/// A complete search clause, e.g. `keyword:flying` or `otag:ramp`.
	Tag(&'static str),
	/// An oracle-text fragment, compiled as `o:"..."`.
	Oracle(&'static str),
	Format(&'static str),
	Rarity(&'static str),
	Budget(BudgetLevel),
	Modifier(Modifier),
}

const W: Color = Color::White;
const U: Color = Color::Blue;
const B: Color = Color::Black;
const R: Color = Color::Red;
const G: Color = Color::Green;

const COLOR_WORDS: &[(&str, &[Color])] = &[
	("white", &[W]),
	("blue", &[U]),
	("black", &[B]),
	("red", &[R]),
	("green", &[G]),
	("colorless", &[Color::Colorless]),
];

const NAMED_COLORS: &[(&str, &[Color])] = &[
	("azorius", &[W, U]),
	("dimir", &[U, B]),
	("rakdos", &[B, R]),
	("gruul", &[R, G]),
	("selesnya", &[W, G]),
	("orzhov", &[W, B]),
	("izzet", &[U, R]),
	("golgari", &[B, G]),
	("boros", &[W, R]),
	("simic", &[U, G]),
	("bant", &[W, U, G]),
	("esper", &[W, U, B]),
	("grixis", &[U, B, R]),
	("jund", &[B, R, G]),
	("naya", &[W, R, G]),
	("abzan", &[W, B, G]),
	("jeskai", &[W, U, R]),
	("sultai", &[U, B, G]),
	("mardu", &[W, B, R]),
	("temur", &[U, R, G]),
	("five color", &[W, U, B, R, G]),
	("5 color", &[W, U, B, R, G]),
	("wubrg", &[W, U, B, R, G]),
];

const TYPE_WORDS: &[(&str, &str)] = &[
	("creature", "creature"),
	("creatures", "creature"),
	("instant", "instant"),
	("instants", "instant"),
	("sorcery", "sorcery"),
	("sorceries", "sorcery"),
	("artifact", "artifact"),
	("artifacts", "artifact"),
	("enchantment", "enchantment"),
	("enchantments", "enchantment"),
	("planeswalker", "planeswalker"),
	("planeswalkers", "planeswalker"),
	("walkers", "planeswalker"),
	("land", "land"),
	("lands", "land"),
	("battle", "battle"),
	("battles", "battle"),
	("legendary", "legendary"),
	("legends", "legendary"),
	("tribal", "tribal"),
	("kindred", "kindred"),
	("equipment", "equipment"),
	("aura", "aura"),
	("auras", "aura"),
	("saga", "saga"),
	("sagas", "saga"),
	("vehicle", "vehicle"),
	("vehicles", "vehicle"),
	("elf", "elf"),
	("elves", "elf"),
	("goblin", "goblin"),
	("goblins", "goblin"),
	("zombie", "zombie"),
	("zombies", "zombie"),
	("dragon", "dragon"),
	("dragons", "dragon"),
	("angel", "angel"),
	("angels", "angel"),
	("demon", "demon"),
	("demons", "demon"),
	("vampire", "vampire"),
	("vampires", "vampire"),
	("wizard", "wizard"),
	("wizards", "wizard"),
	("merfolk", "merfolk"),
	("sliver", "sliver"),
	("slivers", "sliver"),
	("dinosaur", "dinosaur"),
	("dinosaurs", "dinosaur"),
	("knight", "knight"),
	("knights", "knight"),
	("soldier", "soldier"),
	("soldiers", "soldier"),
	("spirit", "spirit"),
	("spirits", "spirit"),
	("human", "human"),
	("humans", "human"),
	("cat", "cat"),
	("cats", "cat"),
	("rogue", "rogue"),
	("rogues", "rogue"),
	("warrior", "warrior"),
	("warriors", "warrior"),
	("cleric", "cleric"),
	("clerics", "cleric"),
	("elemental", "elemental"),
	("elementals", "elemental"),
	("hydra", "hydra"),
	("hydras", "hydra"),
	("faerie", "faerie"),
	("faeries", "faerie"),
	("pirate", "pirate"),
	("pirates", "pirate"),
];

const TAG_PHRASES: &[(&str, &str)] = &[
	("flying", "keyword:flying"),
	("flyer", "keyword:flying"),
	("flyers", "keyword:flying"),
	("flier", "keyword:flying"),
	("fliers", "keyword:flying"),
	("trample", "keyword:trample"),
	("haste", "keyword:haste"),
	("deathtouch", "keyword:deathtouch"),
	("lifelink", "keyword:lifelink"),
	("vigilance", "keyword:vigilance"),
	("flash", "keyword:flash"),
	("hexproof", "keyword:hexproof"),
	("indestructible", "keyword:indestructible"),
	("menace", "keyword:menace"),
	("reach", "keyword:reach"),
	("first strike", "keyword:\"first strike\""),
	("double strike", "keyword:\"double strike\""),
	("ward", "keyword:ward"),
	("defender", "keyword:defender"),
	("prowess", "keyword:prowess"),
	("cascade", "keyword:cascade"),
	("convoke", "keyword:convoke"),
	("removal", "otag:removal"),
	("ramp", "otag:ramp"),
	("mana ramp", "otag:ramp"),
	("mana rock", "otag:mana-rock"),
	("mana rocks", "otag:mana-rock"),
	("mana dork", "otag:mana-dork"),
	("mana dorks", "otag:mana-dork"),
	("counterspell", "otag:counterspell"),
	("counterspells", "otag:counterspell"),
	("board wipe", "otag:board-wipe"),
	("board wipes", "otag:board-wipe"),
	("wrath", "otag:board-wipe"),
	("wraths", "otag:board-wipe"),
	("sweeper", "otag:board-wipe"),
	("sweepers", "otag:board-wipe"),
	("tutor", "otag:tutor"),
	("tutors", "otag:tutor"),
	("card draw", "otag:draw"),
	("card advantage", "otag:card-advantage"),
	("reanimation", "otag:reanimate"),
	("reanimate", "otag:reanimate"),
	("reanimator", "otag:reanimate"),
	("burn", "otag:burn"),
	("lifegain", "otag:lifegain"),
	("life gain", "otag:lifegain"),
	("token generator", "otag:token-generator"),
	("token generators", "otag:token-generator"),
	("sac outlet", "otag:sac-outlet"),
	("sac outlets", "otag:sac-outlet"),
	("sacrifice outlet", "otag:sac-outlet"),
	("sacrifice outlets", "otag:sac-outlet"),
	("fetch land", "is:fetchland"),
	("fetch lands", "is:fetchland"),
	("fetchlands", "is:fetchland"),
	("dual land", "is:dual"),
	("dual lands", "is:dual"),
	("duals", "is:dual"),
	("shock land", "is:shockland"),
	("shock lands", "is:shockland"),
	("shocklands", "is:shockland"),
	("commanders", "is:commander"),
	("reprint", "is:reprint"),
	("reprints", "is:reprint"),
	("reprinted", "is:reprint"),
	("first printing", "is:firstprint"),
	("first print", "is:firstprint"),
	("original printing", "is:firstprint"),
	("permanent", "is:permanent"),
	("permanents", "is:permanent"),
	("mdfc", "is:mdfc"),
	("mdfcs", "is:mdfc"),
	("multicolor", "is:multicolor"),
	("multicolored", "is:multicolor"),
	("gold", "is:multicolor"),
];

const ORACLE_PHRASES: &[(&str, &str)] = &[
	("draw cards", "draw"),
	("draws cards", "draw"),
	("draw a card", "draw a card"),
	("card drawing", "draw"),
	("enters the battlefield", "enters"),
	("enter the battlefield", "enters"),
	("etb", "enters"),
	("etbs", "enters"),
	("dies", "dies"),
	("death trigger", "dies"),
	("death triggers", "dies"),
	("sacrifice", "sacrifice"),
	("mill", "mill"),
	("discard", "discard"),
	("+1/+1 counter", "+1/+1 counter"),
	("+1/+1 counters", "+1/+1 counter"),
	("-1/-1 counter", "-1/-1 counter"),
	("-1/-1 counters", "-1/-1 counter"),
	("proliferate", "proliferate"),
	("scry", "scry"),
	("untap", "untap"),
	("gain control", "gain control"),
	("steal", "gain control"),
	("extra turn", "extra turn"),
	("extra turns", "extra turn"),
	("copy", "copy"),
	("tokens", "token"),
	("create tokens", "create"),
	("make tokens", "create"),
	("treasure", "treasure"),
	("treasures", "treasure"),
	("food", "food"),
	("clue", "clue"),
	("clues", "clue"),
	("graveyard", "graveyard"),
	("exile", "exile"),
	("destroy", "destroy"),
	("bounce", "return target"),
	("return to hand", "return target"),
	("counter target spell", "counter target spell"),
	("deal damage", "damage"),
	("deals damage", "damage"),
	("lose life", "loses life"),
	("drain", "loses life"),
	("landfall", "landfall"),
	("cast from graveyard", "from your graveyard"),
	("search your library", "search your library"),
	("flicker", "return it to the battlefield"),
	("blink", "return it to the battlefield"),
];

const FORMAT_PHRASES: &[(&str, &str)] = &[
	("commander", "commander"),
	("for commander", "commander"),
	("in commander", "commander"),
	("commander legal", "commander"),
	("edh", "commander"),
	("cedh", "commander"),
	("standard", "standard"),
	("pioneer", "pioneer"),
	("modern", "modern"),
	("legacy", "legacy"),
	("vintage", "vintage"),
	("pauper", "pauper"),
	("brawl", "brawl"),
	("historic", "historic"),
	("oathbreaker", "oathbreaker"),
];

const RARITY_PHRASES: &[(&str, &str)] = &[
	("common", "common"),
	("commons", "common"),
	("uncommon", "uncommon"),
	("uncommons", "uncommon"),
	("rare", "rare"),
	("rares", "rare"),
	("mythic", "mythic"),
	("mythics", "mythic"),
	("mythic rare", "mythic"),
	("mythic rares", "mythic"),
];

const BUDGET_PHRASES: &[(&str, BudgetLevel)] = &[
	("very cheap", BudgetLevel::VeryCheap),
	("super cheap", BudgetLevel::VeryCheap),
	("dirt cheap", BudgetLevel::VeryCheap),
	("cheap", BudgetLevel::Cheap),
	("cheaper", BudgetLevel::Cheap),
	("budget", BudgetLevel::Cheap),
	("inexpensive", BudgetLevel::Cheap),
	("affordable", BudgetLevel::Cheap),
	("expensive", BudgetLevel::Expensive),
	("pricey", BudgetLevel::Expensive),
	("high end", BudgetLevel::Expensive),
];

const MODIFIER_WORDS: &[(&str, Modifier)] = &[
	("identity", Modifier::Identity),
	("color identity", Modifier::Identity),
	("deck", Modifier::Identity),
	("decks", Modifier::Identity),
	("exactly", Modifier::Exact),
	("only", Modifier::Exact),
	("mono", Modifier::Exact),
	("and", Modifier::And),
	("or", Modifier::Or),
];

/// Filler words that carry no search intent.
const STOP_WORDS: &[&str] = &[
	"a", "all", "an", "any", "are", "as", "at", "be", "best", "but", "can", "card", "cards",
	"cool", "do", "does", "find", "for", "from", "get", "give", "good", "great", "has", "have",
	"i", "in", "into", "is", "it", "its", "legal", "like", "look", "looking", "me", "my", "need",
	"of", "on", "one", "ones", "please", "play", "playable", "search", "show", "some", "something",
	"spell", "spells", "that", "the", "their", "them", "these", "they", "this", "those", "to",
	"top", "want", "what", "which", "who", "will", "with", "would", "you", "your",
];

static PHRASES: LazyLock<HashMap<&'static str, Term>> = LazyLock::new(|| {
	let mut map = HashMap::new();

	for (phrase, colors) in COLOR_WORDS {
		map.insert(*phrase, Term::Color { colors, named: false });
	}
	for (phrase, colors) in NAMED_COLORS {
		map.insert(*phrase, Term::Color { colors, named: true });
	}
	for (phrase, value) in TYPE_WORDS {
		map.insert(*phrase, Term::Type(value));
	}
	for (phrase, clause) in TAG_PHRASES {
		map.insert(*phrase, Term::Tag(clause));
	}
	for (phrase, fragment) in ORACLE_PHRASES {
		map.insert(*phrase, Term::Oracle(fragment));
	}
	for (phrase, format) in FORMAT_PHRASES {
		map.insert(*phrase, Term::Format(format));
	}
	for (phrase, rarity) in RARITY_PHRASES {
		map.insert(*phrase, Term::Rarity(rarity));
	}
	for (phrase, level) in BUDGET_PHRASES {
		map.insert(*phrase, Term::Budget(*level));
	}
	for (phrase, modifier) in MODIFIER_WORDS {
		map.insert(*phrase, Term::Modifier(*modifier));
	}

	map
});

pub fn lookup(phrase: &str) -> Option<Term> {
	PHRASES.get(phrase).copied()
}

pub fn is_stop_word(word: &str) -> bool {
	STOP_WORDS.contains(&word)
}

/// Canonical format names accepted in structured filters.
pub fn is_known_format(format: &str) -> bool {
	FORMAT_PHRASES.iter().any(|(_, canonical)| *canonical == format)
}

pub fn is_known_rarity(rarity: &str) -> bool {
	matches!(rarity, "common" | "uncommon" | "rare" | "mythic" | "special" | "bonus")
}
